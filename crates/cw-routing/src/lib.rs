//! cw-routing: upstream load aggregation.
//!
//! Sums transfer-model loads over every catchment upstream of each
//! selected outlet, in a fixed reproducible order, and exports the
//! aggregated series as tabular files.

pub mod aggregate;
pub mod csv_export;

pub use aggregate::{AggregatedResult, Aggregator, MissingPolicy};
pub use csv_export::write_series_csv;

use cw_core::CatchmentId;

pub type RoutingResult<T> = Result<T, RoutingError>;

#[derive(thiserror::Error, Debug)]
pub enum RoutingError {
    #[error("Outlet {id} is not part of the precomputed upstream sets")]
    UnknownOutlet { id: CatchmentId },

    #[error("Series of catchment {id} is not aligned with the run period")]
    Alignment { id: CatchmentId },

    #[error("Missing data: catchment {id} has no dataset '{dataset}'")]
    MissingData { id: CatchmentId, dataset: String },

    #[error("Store error: {0}")]
    Store(#[from] cw_store::StoreError),

    #[error("Series error: {0}")]
    Core(#[from] cw_core::CoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
