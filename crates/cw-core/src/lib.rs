//! cw-core: shared primitives for the CrossWater pipeline.
//!
//! Catchment identifiers, the fixed-step run period, time series, and the
//! base error type every other crate builds on.

pub mod error;
pub mod ids;
pub mod series;
pub mod timing;

pub use error::{CoreError, CoreResult};
pub use ids::CatchmentId;
pub use series::{TimeAxis, TimeSeries};
