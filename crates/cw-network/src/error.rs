//! Topology validation errors. All of these are fatal: the pipeline aborts
//! before any computation runs on an invalid network.

use cw_core::CatchmentId;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Cycle in drainage network through catchment {id}")]
    Cycle { id: CatchmentId },

    #[error("Catchment {id} lists more than one downstream parent")]
    DuplicateParent { id: CatchmentId },

    #[error("Unknown catchment {id}")]
    UnknownId { id: CatchmentId },
}
