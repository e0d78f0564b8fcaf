//! Built-in reference transfer model.
//!
//! A deliberately simple export-coefficient formulation: the substance is
//! applied once over the catchment's application area and washed off by
//! precipitation, with first-order dissipation of the remaining stock.
//! It exists so the pipeline and its tests run without the external
//! transfer-model executable; the numbers are plausible, not calibrated.

use crate::model::{CatchmentContext, TransferModel, TransferOutput};
use crate::{TransferError, TransferResult};

/// Catchment parameter: application area (m^2).
pub const PARAM_APPL_AREA: &str = "A_appl";
/// Substance parameter: applied mass per application area (g/m^2).
pub const PARAM_APPLICATION_RATE: &str = "application_rate";
/// Substance parameter: stock fraction mobilized per mm precipitation
/// (1/mm).
pub const PARAM_WASHOFF_COEFFICIENT: &str = "washoff_coefficient";
/// Substance parameter: first-order stock dissipation (1/h). Optional,
/// defaults to 0.
pub const PARAM_DISSIPATION_RATE: &str = "dissipation_rate";

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportCoefficientModel;

impl ExportCoefficientModel {
    fn required(ctx: &CatchmentContext<'_>, key: &str) -> TransferResult<f64> {
        ctx.substance.get(key).ok_or_else(|| TransferError::Computation {
            what: format!("substance '{}' is missing parameter '{key}'", ctx.substance.name),
        })
    }
}

impl TransferModel for ExportCoefficientModel {
    fn run(&self, ctx: &CatchmentContext<'_>) -> TransferResult<TransferOutput> {
        let appl_area =
            ctx.parameters
                .value(PARAM_APPL_AREA)
                .ok_or_else(|| TransferError::Computation {
                    what: format!("catchment {} is missing parameter '{PARAM_APPL_AREA}'", ctx.id),
                })?;
        let application_rate = Self::required(ctx, PARAM_APPLICATION_RATE)?;
        let washoff = Self::required(ctx, PARAM_WASHOFF_COEFFICIENT)?;
        let dissipation = ctx.substance.get(PARAM_DISSIPATION_RATE).unwrap_or(0.0);

        if appl_area < 0.0 || application_rate < 0.0 || washoff < 0.0 || dissipation < 0.0 {
            return Err(TransferError::Computation {
                what: "negative area or rate parameter".to_string(),
            });
        }

        let axis = ctx.precipitation.axis();
        let step_hours = axis.step_seconds() as f64 / 3600.0;
        let decay = (-dissipation * step_hours).exp();

        let mut stock = appl_area * application_rate;
        let mut load = Vec::with_capacity(axis.steps());
        let mut concentration = Vec::with_capacity(axis.steps());

        for step in 0..axis.steps() {
            let precip = ctx.precipitation.values()[step];
            let discharge = ctx.discharge.values()[step];
            if precip < 0.0 {
                return Err(TransferError::Computation {
                    what: format!("negative precipitation at step {step}"),
                });
            }

            let fraction = washoff * precip * step_hours;
            if fraction > 1.0 {
                // More stock mobilized than exists: the washoff
                // parameterization is unstable at this time step.
                return Err(TransferError::Convergence {
                    what: format!(
                        "washoff fraction {fraction:.3} exceeds 1 at step {step}; \
                         reduce '{PARAM_WASHOFF_COEFFICIENT}'"
                    ),
                });
            }

            let mobilized = stock * fraction;
            stock = (stock - mobilized) * decay;

            let load_g_per_h = mobilized / step_hours;
            load.push(load_g_per_h);

            // g/h over m^3/h gives g/m^3; report ug/m^3.
            let flow_m3_per_h = discharge * 3600.0;
            concentration.push(if flow_m3_per_h > 0.0 {
                load_g_per_h / flow_m3_per_h * 1e6
            } else {
                0.0
            });
        }

        Ok(TransferOutput {
            load,
            concentration: Some(concentration),
        })
    }
}
