//! The transfer-model boundary.

use std::collections::BTreeMap;

use cw_core::{CatchmentId, TimeSeries};
use cw_store::ParameterSet;

use crate::TransferResult;

/// Static per-substance parameters, shared by every catchment of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstanceParams {
    pub name: String,
    pub parameters: BTreeMap<String, f64>,
}

impl SubstanceParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).copied()
    }
}

/// Everything one model invocation sees: the catchment's own drivers and
/// constants plus the substance parameters. No cross-catchment state, which
/// is what makes the per-catchment fan-out safe.
#[derive(Debug)]
pub struct CatchmentContext<'a> {
    pub id: CatchmentId,
    pub parameters: &'a ParameterSet,
    pub temperature: &'a TimeSeries,
    pub precipitation: &'a TimeSeries,
    pub discharge: &'a TimeSeries,
    pub substance: &'a SubstanceParams,
}

/// One load value per axis step (g/h), optionally with a concentration
/// series (ug/m^3) on the same axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutput {
    pub load: Vec<f64>,
    pub concentration: Option<Vec<f64>>,
}

/// The substance-transfer model: local driving data in, released load out.
///
/// One narrow method so alternate implementations (the external
/// iWaQa-style executable, the built-in reference model, test stubs) swap
/// in without touching the orchestration. Implementations must be
/// deterministic: identical inputs produce bit-identical output.
pub trait TransferModel: Send + Sync {
    fn run(&self, ctx: &CatchmentContext<'_>) -> TransferResult<TransferOutput>;
}
