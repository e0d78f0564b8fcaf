//! cw-store: the catchment store.
//!
//! A hierarchical, durable, resumable on-disk dataset keyed by catchment
//! id, with one sub-key per dataset name. The layout is part of the format
//! contract: re-opening a store from a prior run resumes correctly.

pub mod dataset;
pub mod hash;
pub mod store;
pub mod types;

pub use hash::compute_store_id;
pub use store::CatchmentStore;
pub use types::{Parameter, ParameterSet, StoreManifest};

use cw_core::CatchmentId;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset not found: catchment {id}, dataset '{dataset}'")]
    NotFound { id: CatchmentId, dataset: String },

    #[error("Parameters not found for catchment {id}")]
    ParametersNotFound { id: CatchmentId },

    #[error("Schema violation for catchment {id}, dataset '{dataset}': {what}")]
    Schema {
        id: CatchmentId,
        dataset: String,
        what: String,
    },

    #[error("No store manifest at {path}")]
    MissingManifest { path: std::path::PathBuf },

    #[error("A store already exists at {path}")]
    AlreadyExists { path: std::path::PathBuf },

    #[error("Invalid dataset name '{name}'")]
    InvalidDataset { name: String },
}
