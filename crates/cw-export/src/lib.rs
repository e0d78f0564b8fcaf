//! cw-export: system-description files for the external hydraulic solver.
//!
//! Collapses the drainage subtree feeding an outlet selection into a
//! compartment/link graph, attaches per-compartment input series, and
//! writes the solver's brace-format input file byte-deterministically. A
//! matching reader exists for verification.

pub mod compartments;
pub mod reader;
pub mod writer;

pub use compartments::{Compartment, CompartmentSeries, Link, RiverSystem};
pub use reader::{read_aqu, ParsedAqu};
pub use writer::write_aqu;

use cw_core::CatchmentId;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// The drainage structure cannot be expressed in the solver's
    /// segment/link model. Fatal; checked before any series is read.
    #[error("Unsupported topology: {what}")]
    UnsupportedTopology { what: String },

    #[error("Missing data: catchment {id} has no dataset '{dataset}'")]
    MissingData { id: CatchmentId, dataset: String },

    #[error("Network error: {0}")]
    Network(#[from] cw_network::NetworkError),

    #[error("Store error: {0}")]
    Store(#[from] cw_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed system file: {what}")]
    Parse { what: String },
}
