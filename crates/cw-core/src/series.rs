//! Fixed-step time axis and time series.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Timestamp format used in driver tables and exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The run period: a fixed-step sequence of timestamps shared by every
/// series of a model run.
///
/// Timestamps are strictly increasing by construction (positive step, no
/// duplicates), which is the invariant all alignment checks rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAxis {
    start: NaiveDateTime,
    step_seconds: u32,
    steps: usize,
}

impl TimeAxis {
    pub fn new(start: NaiveDateTime, step_seconds: u32, steps: usize) -> CoreResult<Self> {
        if step_seconds == 0 {
            return Err(CoreError::InvalidArg {
                what: "step_seconds must be positive",
            });
        }
        if steps == 0 {
            return Err(CoreError::InvalidArg {
                what: "axis must have at least one step",
            });
        }
        Ok(Self {
            start,
            step_seconds,
            steps,
        })
    }

    /// Hourly axis, the step the basin drivers are supplied at.
    pub fn hourly(start: NaiveDateTime, steps: usize) -> CoreResult<Self> {
        Self::new(start, 3600, steps)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn step_seconds(&self) -> u32 {
        self.step_seconds
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Timestamp of step `i`, or `None` past the end of the axis.
    pub fn timestamp(&self, i: usize) -> Option<NaiveDateTime> {
        if i >= self.steps {
            return None;
        }
        Some(self.start + Duration::seconds(i as i64 * self.step_seconds as i64))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.steps).map(move |i| {
            self.start + Duration::seconds(i as i64 * self.step_seconds as i64)
        })
    }

    /// Step index of `at` if it lies exactly on the axis.
    pub fn index_of(&self, at: NaiveDateTime) -> Option<usize> {
        let offset = (at - self.start).num_seconds();
        if offset < 0 || offset % self.step_seconds as i64 != 0 {
            return None;
        }
        let i = (offset / self.step_seconds as i64) as usize;
        (i < self.steps).then_some(i)
    }
}

/// A value per axis step, for one subcatchment and one quantity.
///
/// Values are finite by construction; a series always carries the axis it
/// was built against so consumers can verify alignment without a side
/// channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    axis: TimeAxis,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(axis: TimeAxis, values: Vec<f64>) -> CoreResult<Self> {
        if values.len() != axis.steps() {
            return Err(CoreError::LengthMismatch {
                len: values.len(),
                steps: axis.steps(),
            });
        }
        for (step, v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(CoreError::NonFinite {
                    what: "series value",
                    step,
                });
            }
        }
        Ok(Self { axis, values })
    }

    pub fn zeros(axis: TimeAxis) -> Self {
        let steps = axis.steps();
        Self {
            axis,
            values: vec![0.0; steps],
        }
    }

    pub fn constant(axis: TimeAxis, value: f64) -> CoreResult<Self> {
        let steps = axis.steps();
        Self::new(axis, vec![value; steps])
    }

    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.axis.timestamps().zip(self.values.iter().copied())
    }

    /// Pointwise accumulation. The caller is responsible for alignment
    /// checks with a domain-specific error; this only guards the invariant.
    pub fn add_assign(&mut self, other: &TimeSeries) -> CoreResult<()> {
        if self.axis != other.axis {
            return Err(CoreError::AxisMismatch {
                what: "pointwise sum over differing axes",
            });
        }
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += b;
        }
        Ok(())
    }
}
