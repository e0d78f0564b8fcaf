//! cw-transfer: the transfer engine.
//!
//! Applies the substance-transfer model to every catchment independently
//! and writes the resulting load (and concentration) series back to the
//! catchment store. The chemistry itself lives behind the [`TransferModel`]
//! trait; this crate owns the fan-out, the write-back, and the
//! partial-failure bookkeeping.

pub mod engine;
pub mod export_coefficient;
pub mod external;
pub mod model;

pub use engine::{TransferEngine, TransferOptions, TransferSummary};
pub use export_coefficient::ExportCoefficientModel;
pub use external::ExternalProcessModel;
pub use model::{CatchmentContext, SubstanceParams, TransferModel, TransferOutput};

pub type TransferResult<T> = Result<T, TransferError>;

/// Per-catchment transfer failure.
///
/// `Computation` is retryable: the same catchment may be re-submitted once
/// its inputs are corrected. `Convergence` is not retryable without
/// parameter changes and never aborts the fan-out by itself; failed ids
/// are collected and reported.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("Computation failed: {what}")]
    Computation { what: String },

    #[error("Transfer model did not converge: {what}")]
    Convergence { what: String },

    #[error("Store error: {0}")]
    Store(#[from] cw_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Whether re-running with corrected inputs can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransferError::Convergence { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level failure, as opposed to a per-catchment one.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] cw_store::StoreError),

    #[error("Worker pool error: {what}")]
    WorkerPool { what: String },
}
