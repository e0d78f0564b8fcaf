//! Transfer fan-out orchestration and the routing barrier.

use std::sync::atomic::AtomicBool;

use cw_core::CatchmentId;
use cw_network::UpstreamSets;
use cw_project::{Project, TransferModelDef};
use cw_store::{dataset, CatchmentStore};
use cw_transfer::{
    ExportCoefficientModel, ExternalProcessModel, SubstanceParams, TransferEngine, TransferModel,
    TransferOptions,
};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Aggregated outcome of the transfer stage, one entry per substance.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub substances: Vec<SubstanceReport>,
}

#[derive(Debug)]
pub struct SubstanceReport {
    pub substance: String,
    pub completed: usize,
    pub failed_computation: Vec<CatchmentId>,
    pub failed_convergence: Vec<CatchmentId>,
    pub cancelled: usize,
}

impl TransferReport {
    pub fn total_computation_failures(&self) -> usize {
        self.substances.iter().map(|s| s.failed_computation.len()).sum()
    }

    pub fn total_convergence_failures(&self) -> usize {
        self.substances.iter().map(|s| s.failed_convergence.len()).sum()
    }

    pub fn was_cancelled(&self) -> bool {
        self.substances.iter().any(|s| s.cancelled > 0)
    }

    /// One-line summary for the failure report.
    pub fn describe_failures(&self) -> String {
        let mut parts = Vec::new();
        for report in &self.substances {
            if !report.failed_computation.is_empty() {
                parts.push(format!(
                    "{}: {} computation failures (first: {})",
                    report.substance,
                    report.failed_computation.len(),
                    report.failed_computation[0],
                ));
            }
            if !report.failed_convergence.is_empty() {
                parts.push(format!(
                    "{}: {} convergence failures (first: {})",
                    report.substance,
                    report.failed_convergence.len(),
                    report.failed_convergence[0],
                ));
            }
        }
        parts.join("; ")
    }
}

fn build_model(project: &Project, store: &CatchmentStore) -> AppResult<Box<dyn TransferModel>> {
    match &project.transfer.model {
        TransferModelDef::ExportCoefficient => Ok(Box::new(ExportCoefficientModel)),
        TransferModelDef::External {
            program,
            layout_template,
        } => {
            let scratch = store.root().join("tmp");
            let model =
                ExternalProcessModel::new(program.clone(), layout_template, scratch)?;
            Ok(Box::new(model))
        }
    }
}

/// Fan the transfer model out over the whole store, one pass per
/// substance. Per-catchment failures are collected into the report, never
/// propagated from inside the fan-out.
pub fn run(
    project: &Project,
    store: &CatchmentStore,
    cancel: &AtomicBool,
) -> AppResult<TransferReport> {
    let model = build_model(project, store)?;
    let engine = TransferEngine::new(store, model.as_ref());
    let options = TransferOptions {
        workers: project.transfer.workers,
    };

    let mut report = TransferReport::default();
    for substance_def in &project.substances {
        let substance = SubstanceParams {
            name: substance_def.name.clone(),
            parameters: substance_def.parameters.clone(),
        };
        let summary = engine.run_all(&substance, &options, cancel)?;
        report.substances.push(SubstanceReport {
            substance: substance_def.name.clone(),
            completed: summary.completed.len(),
            failed_computation: summary.computation_failures(),
            failed_convergence: summary.convergence_failures(),
            cancelled: summary.cancelled.len(),
        });
    }
    Ok(report)
}

/// The barrier in front of routing: every catchment feeding a selected
/// outlet must have its transfer result in the store (unless gaps are
/// tolerated by configuration).
pub fn verify_complete(
    project: &Project,
    store: &CatchmentStore,
    upstream: &UpstreamSets,
) -> AppResult<()> {
    let members = upstream.all_members();
    for substance in &project.substances {
        let load_dataset = dataset::load(&substance.name);
        let missing: Vec<CatchmentId> = members
            .iter()
            .copied()
            .filter(|&id| !store.contains(id, &load_dataset))
            .collect();
        if missing.is_empty() {
            continue;
        }
        if project.routing.allow_missing {
            warn!(
                substance = %substance.name,
                missing = missing.len(),
                "routing with missing transfer results (treated as zero)"
            );
            continue;
        }
        return Err(AppError::StageFailed {
            stage: "transfer",
            what: format!(
                "{} of {} upstream catchments have no '{}' result (first: {})",
                missing.len(),
                members.len(),
                load_dataset,
                missing[0],
            ),
        });
    }
    info!("transfer results cover the outlet selection");
    Ok(())
}
