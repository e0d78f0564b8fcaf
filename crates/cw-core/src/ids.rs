use core::fmt;
use core::num::ParseIntError;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of a subcatchment.
///
/// Unlike graph-internal indices, this is the external key carried by the
/// input data and the on-disk store, so it survives across runs and across
/// differently-ordered imports. Ascending-id order is the reproducible
/// iteration order everywhere in the pipeline.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CatchmentId(u64);

impl CatchmentId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CatchmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CatchmentId({})", self.0)
    }
}

impl fmt::Display for CatchmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CatchmentId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl FromStr for CatchmentId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}
