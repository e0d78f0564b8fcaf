//! Project schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use cw_core::series::TIMESTAMP_FORMAT;
use cw_core::{CatchmentId, TimeAxis};
use serde::{Deserialize, Serialize};

use crate::ProjectError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub period: PeriodDef,
    /// Root directory of the catchment store this run reads and writes.
    pub store_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportDef>,
    pub substances: Vec<SubstanceDef>,
    #[serde(default)]
    pub transfer: TransferDef,
    pub routing: RoutingDef,
}

/// The run period. Start is given in `%Y-%m-%d %H:%M:%S`; the basin
/// drivers arrive hourly, so `step_hours` defaults to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodDef {
    pub start: String,
    #[serde(default = "default_step_hours")]
    pub step_hours: u32,
    pub steps: usize,
}

fn default_step_hours() -> u32 {
    1
}

impl PeriodDef {
    pub fn axis(&self) -> Result<TimeAxis, ProjectError> {
        let start = NaiveDateTime::parse_from_str(&self.start, TIMESTAMP_FORMAT)
            .map_err(|e| ProjectError::Period {
                what: format!("cannot parse start '{}': {e}", self.start),
            })?;
        TimeAxis::new(start, self.step_hours * 3600, self.steps).map_err(|e| {
            ProjectError::Period {
                what: e.to_string(),
            }
        })
    }
}

/// Input data locations, owned by an external collaborator.
///
/// The attribute table is a semicolon-separated CSV with columns
/// `id;next_down_id;area_m2;appl_area_m2;strahler` (empty `next_down_id`
/// marks a basin outlet). Driver tables carry a `timestamp` column followed
/// by one column per catchment id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportDef {
    pub catchment_attributes: PathBuf,
    pub temperature: PathBuf,
    pub precipitation: PathBuf,
    pub discharge: PathBuf,
    /// Only catchments up to this Strahler order run the transfer model;
    /// larger rivers belong to the routing model. `null` disables the
    /// filter.
    #[serde(default = "default_max_strahler")]
    pub max_strahler: Option<u32>,
}

fn default_max_strahler() -> Option<u32> {
    Some(3)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstanceDef {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TransferDef {
    /// Worker pool size for the per-catchment fan-out; `null` lets the
    /// pool size follow the available cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default)]
    pub model: TransferModelDef,
    /// Advance to routing even when some catchments failed to converge.
    #[serde(default)]
    pub continue_on_convergence_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransferModelDef {
    /// Built-in deterministic reference model.
    #[default]
    ExportCoefficient,
    /// External transfer-model executable invoked per catchment with a
    /// rendered layout file and a tab-separated driver table.
    External {
        program: PathBuf,
        layout_template: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDef {
    pub outlets: Vec<CatchmentId>,
    #[serde(default)]
    pub mode: RoutingMode,
    /// Treat a catchment without a transfer result as a zero contribution
    /// instead of failing the aggregation.
    #[serde(default)]
    pub allow_missing: bool,
    pub output_dir: PathBuf,
    /// First-order biodegradation rate passed to the hydraulic solver
    /// (1/h).
    #[serde(default = "default_biodegradation_rate")]
    pub biodegradation_rate: f64,
}

fn default_biodegradation_rate() -> f64 {
    0.005
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    /// Sum transfer loads over each outlet's upstream set.
    #[default]
    Aggregate,
    /// Emit a system-description input file for the external hydraulic
    /// solver instead of aggregating in-process.
    ExportModel,
}
