//! Progressive slowdown: each point is delayed a little more than the last.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::Activity;
use crate::{GpxToolsError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowDownParams {
    /// Extra delay added per point, in milliseconds.
    pub factor_ms: u32,
}

impl Default for SlowDownParams {
    fn default() -> Self {
        Self { factor_ms: 100 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlowDownReport {
    pub points_delayed: usize,
    /// Delay applied to the last point.
    pub added_ms: i64,
}

/// Delays the n-th point (1-indexed, across all tracks and segments) by
/// `n * factor_ms` milliseconds. Nothing is modified if a delayed timestamp
/// would leave the supported time range.
pub fn slow_down(activity: &mut Activity, params: &SlowDownParams) -> Result<SlowDownReport> {
    let factor = i64::from(params.factor_ms);
    let mut report = SlowDownReport::default();
    let mut correction = factor;
    let mut delayed = Vec::with_capacity(activity.point_count());

    for point in activity.points() {
        let time = point
            .time
            .checked_add_signed(Duration::milliseconds(correction))
            .ok_or(GpxToolsError::TimestampOverflow {
                time: point.time,
                delta_s: correction / 1000,
            })?;
        delayed.push(time);
        report.points_delayed += 1;
        report.added_ms = correction;
        correction += factor;
    }

    for (point, time) in activity.points_mut().zip(delayed) {
        point.time = time;
    }
    Ok(report)
}
