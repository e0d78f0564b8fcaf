//! The pipeline driver.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use cw_project::Project;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::import_service::{self, ImportReport};
use crate::progress::{RunProgressEvent, RunStage};
use crate::route_service::{self, RouteReport};
use crate::state::PipelineState;
use crate::transfer_service::{self, TransferReport};

/// Which stages this invocation executes. Earlier stages that already ran
/// in a prior invocation are verified against the store instead of being
/// re-run; later stages are not entered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSelection {
    Full,
    ImportOnly,
    TransferOnly,
    RouteOnly,
}

impl StageSelection {
    fn executes_import(self) -> bool {
        matches!(self, StageSelection::Full | StageSelection::ImportOnly)
    }

    fn executes_transfer(self) -> bool {
        matches!(self, StageSelection::Full | StageSelection::TransferOnly)
    }

    fn executes_route(self) -> bool {
        matches!(self, StageSelection::Full | StageSelection::RouteOnly)
    }
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub import: Option<ImportReport>,
    pub transfer: Option<TransferReport>,
    pub route: Option<RouteReport>,
}

/// Sequences store population, transfer, and routing.
///
/// Stage order is fixed; routing never starts before the transfer barrier
/// holds for every catchment feeding the selected outlets. Any unrecovered
/// error drops the machine into `Failed` and surfaces as the returned
/// error.
pub struct PipelineDriver {
    project: Project,
    state: PipelineState,
    cancel: Arc<AtomicBool>,
}

impl PipelineDriver {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            state: PipelineState::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Shared flag for cooperative cancellation; setting it stops the
    /// running stage between catchment units.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn transition(&mut self, to: PipelineState) -> AppResult<()> {
        if !self.state.can_transition(to) {
            return Err(AppError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        info!(from = ?self.state, to = ?to, "pipeline transition");
        self.state = to;
        Ok(())
    }

    pub fn run(
        &mut self,
        selection: StageSelection,
        mut progress: Option<&mut dyn FnMut(RunProgressEvent)>,
    ) -> AppResult<PipelineReport> {
        let result = self.run_inner(selection, &mut progress);
        if let Err(err) = &result {
            if !self.state.is_terminal() {
                error!(state = ?self.state, %err, "pipeline failed");
                self.state = PipelineState::Failed;
            }
        }
        result
    }

    fn run_inner(
        &mut self,
        selection: StageSelection,
        progress: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    ) -> AppResult<PipelineReport> {
        let started = Instant::now();
        let mut report = PipelineReport::default();

        self.transition(PipelineState::Importing)?;
        emit(progress, RunStage::Importing, started, None);
        let store = if selection.executes_import() {
            let (store, import_report) = import_service::run(&self.project, &self.cancel)?;
            if self.cancel.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(AppError::StageFailed {
                    stage: "import",
                    what: "cancelled".to_string(),
                });
            }
            report.import = Some(import_report);
            store
        } else {
            import_service::verify_store(&self.project)?
        };
        if selection == StageSelection::ImportOnly {
            self.transition(PipelineState::Done)?;
            emit(progress, RunStage::Completed, started, None);
            return Ok(report);
        }

        self.transition(PipelineState::Transferring)?;
        emit(progress, RunStage::Transferring, started, None);
        let tree = route_service::build_network(&self.project)?;
        let upstream = route_service::upstream_sets(&self.project, &tree)?;
        if selection.executes_transfer() {
            let transfer_report = transfer_service::run(&self.project, &store, &self.cancel)?;
            self.decide_transfer(&transfer_report)?;
            report.transfer = Some(transfer_report);
        }
        // The barrier: routing may only start once results cover the
        // selected outlets, whether they were computed now or earlier.
        transfer_service::verify_complete(&self.project, &store, &upstream)?;
        if selection == StageSelection::TransferOnly {
            self.transition(PipelineState::Done)?;
            emit(progress, RunStage::Completed, started, None);
            return Ok(report);
        }

        self.transition(PipelineState::Routing)?;
        emit(progress, RunStage::Routing, started, None);
        debug_assert!(selection.executes_route());
        let route_report = route_service::run(&self.project, &store, &tree, &upstream)?;
        report.route = Some(route_report);

        self.transition(PipelineState::Done)?;
        emit(progress, RunStage::Completed, started, None);
        Ok(report)
    }

    /// Advance-or-fail decision over the aggregated fan-out report.
    /// Computation failures mean broken inputs and always fail the stage;
    /// convergence failures are tolerated when configured.
    fn decide_transfer(&self, report: &TransferReport) -> AppResult<()> {
        if report.was_cancelled() {
            return Err(AppError::StageFailed {
                stage: "transfer",
                what: "cancelled".to_string(),
            });
        }
        if report.total_computation_failures() > 0 {
            return Err(AppError::StageFailed {
                stage: "transfer",
                what: report.describe_failures(),
            });
        }
        if report.total_convergence_failures() > 0
            && !self.project.transfer.continue_on_convergence_failure
        {
            return Err(AppError::StageFailed {
                stage: "transfer",
                what: format!(
                    "{} (set transfer.continue_on_convergence_failure to proceed with a \
                     partial result set)",
                    report.describe_failures()
                ),
            });
        }
        Ok(())
    }
}

fn emit(
    progress: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
        });
    }
}
