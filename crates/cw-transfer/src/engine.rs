//! Per-catchment fan-out and write-back.

use std::sync::atomic::{AtomicBool, Ordering};

use cw_core::{CatchmentId, TimeSeries};
use cw_store::{dataset, CatchmentStore, StoreError};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::model::{CatchmentContext, SubstanceParams, TransferModel};
use crate::{EngineError, EngineResult, TransferError};

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Worker pool size; `None` uses the global rayon pool.
    pub workers: Option<usize>,
}

/// Outcome of one fan-out over the whole store.
///
/// Per-catchment failures are collected rather than propagated so the
/// caller can decide whether a partial result set is acceptable.
#[derive(Debug, Default)]
pub struct TransferSummary {
    pub completed: Vec<CatchmentId>,
    pub failed: Vec<(CatchmentId, TransferError)>,
    pub cancelled: Vec<CatchmentId>,
}

impl TransferSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    /// Ids that failed with a retryable error (bad or missing inputs).
    pub fn computation_failures(&self) -> Vec<CatchmentId> {
        self.failed
            .iter()
            .filter(|(_, e)| e.is_retryable())
            .map(|&(id, _)| id)
            .collect()
    }

    /// Ids the model could not converge for; re-running without parameter
    /// changes will not help.
    pub fn convergence_failures(&self) -> Vec<CatchmentId> {
        self.failed
            .iter()
            .filter(|(_, e)| matches!(e, TransferError::Convergence { .. }))
            .map(|&(id, _)| id)
            .collect()
    }
}

/// Orchestrates the transfer model over every catchment in the store.
///
/// Each invocation is independent (no cross-catchment state) and writes
/// its results under its own `(id, dataset)` keys, so the fan-out needs no
/// synchronization beyond the store's per-key write discipline. The
/// returned summary is the barrier: when `run_all` returns, every
/// catchment has either completed, failed, or been skipped by
/// cancellation.
pub struct TransferEngine<'a, M: TransferModel + ?Sized> {
    store: &'a CatchmentStore,
    model: &'a M,
}

impl<'a, M: TransferModel + ?Sized> TransferEngine<'a, M> {
    pub fn new(store: &'a CatchmentStore, model: &'a M) -> Self {
        Self { store, model }
    }

    /// Run the model for one substance over all catchments, ascending by
    /// id. Cancellation is cooperative: a unit already started runs to
    /// completion, pending units are skipped.
    pub fn run_all(
        &self,
        substance: &SubstanceParams,
        options: &TransferOptions,
        cancel: &AtomicBool,
    ) -> EngineResult<TransferSummary> {
        let ids = self.store.list_catchments()?;
        info!(
            substance = %substance.name,
            catchments = ids.len(),
            "starting transfer fan-out"
        );

        let fan_out = || {
            ids.par_iter()
                .map(|&id| {
                    if cancel.load(Ordering::Relaxed) {
                        return (id, None);
                    }
                    (id, Some(self.run_one(id, substance)))
                })
                .collect::<Vec<_>>()
        };

        let results = match options.workers {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| EngineError::WorkerPool {
                    what: e.to_string(),
                })?
                .install(fan_out),
            None => fan_out(),
        };

        let mut summary = TransferSummary::default();
        for (id, outcome) in results {
            match outcome {
                None => summary.cancelled.push(id),
                Some(Ok(())) => summary.completed.push(id),
                Some(Err(err)) => {
                    warn!(catchment = %id, error = %err, "transfer failed");
                    summary.failed.push((id, err));
                }
            }
        }
        info!(
            substance = %substance.name,
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            cancelled = summary.cancelled.len(),
            "transfer fan-out finished"
        );
        Ok(summary)
    }

    fn fetch_driver(&self, id: CatchmentId, name: &str) -> Result<TimeSeries, TransferError> {
        let series = self.store.get_series(id, name).map_err(|e| match e {
            StoreError::NotFound { id, dataset } => TransferError::Computation {
                what: format!("catchment {id} is missing required input '{dataset}'"),
            },
            other => TransferError::Store(other),
        })?;
        if series.axis() != self.store.axis() {
            return Err(TransferError::Computation {
                what: format!("driver '{name}' of catchment {id} is off the run period"),
            });
        }
        Ok(series)
    }

    fn run_one(&self, id: CatchmentId, substance: &SubstanceParams) -> Result<(), TransferError> {
        let parameters = self.store.get_parameters(id).map_err(|e| match e {
            StoreError::ParametersNotFound { id } => TransferError::Computation {
                what: format!("catchment {id} has no parameter table"),
            },
            other => TransferError::Store(other),
        })?;
        let temperature = self.fetch_driver(id, dataset::TEMPERATURE)?;
        let precipitation = self.fetch_driver(id, dataset::PRECIPITATION)?;
        let discharge = self.fetch_driver(id, dataset::DISCHARGE)?;

        let ctx = CatchmentContext {
            id,
            parameters: &parameters,
            temperature: &temperature,
            precipitation: &precipitation,
            discharge: &discharge,
            substance,
        };
        let output = self.model.run(&ctx)?;

        let axis = *self.store.axis();
        // Results carry the catchment's original time index: same
        // timestamps, same step.
        let load = TimeSeries::new(axis, output.load).map_err(|e| TransferError::Computation {
            what: format!("model load series rejected: {e}"),
        })?;
        self.store
            .put_series(id, &dataset::load(&substance.name), &load)?;

        if let Some(values) = output.concentration {
            let concentration =
                TimeSeries::new(axis, values).map_err(|e| TransferError::Computation {
                    what: format!("model concentration series rejected: {e}"),
                })?;
            self.store
                .put_series(id, &dataset::concentration(&substance.name), &concentration)?;
        }
        Ok(())
    }
}
