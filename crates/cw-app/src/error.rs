//! Error types for the cw-app service layer.

use crate::state::PipelineState;

/// Application error type that wraps errors from the backend crates and
/// provides one interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Topology error: {0}")]
    Network(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Import error: {what}")]
    Import { what: String },

    #[error("Stage '{stage}' failed: {what}")]
    StageFailed { stage: &'static str, what: String },

    #[error("Illegal pipeline transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cw-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<cw_project::ProjectError> for AppError {
    fn from(err: cw_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<cw_store::StoreError> for AppError {
    fn from(err: cw_store::StoreError) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<cw_network::NetworkError> for AppError {
    fn from(err: cw_network::NetworkError) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<cw_transfer::EngineError> for AppError {
    fn from(err: cw_transfer::EngineError) -> Self {
        AppError::Transfer(err.to_string())
    }
}

impl From<cw_transfer::TransferError> for AppError {
    fn from(err: cw_transfer::TransferError) -> Self {
        AppError::Transfer(err.to_string())
    }
}

impl From<cw_routing::RoutingError> for AppError {
    fn from(err: cw_routing::RoutingError) -> Self {
        AppError::Routing(err.to_string())
    }
}

impl From<cw_export::ExportError> for AppError {
    fn from(err: cw_export::ExportError) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Import {
            what: err.to_string(),
        }
    }
}
