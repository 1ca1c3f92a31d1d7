//! Collapses recording pauses so the track looks continuously recorded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Activity;
use crate::{GpxToolsError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PauseParams {
    /// Expected interval between two recorded points. Larger gaps are pauses;
    /// a collapsed pause keeps exactly one cadence of spacing.
    pub cadence: Duration,
}

impl Default for PauseParams {
    fn default() -> Self {
        Self {
            cadence: Duration::seconds(1),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseReport {
    pub pauses: usize,
    /// Shift applied to the last point, i.e. the total time taken out.
    pub removed_ms: i64,
    pub points_adjusted: usize,
}

/// Removes pauses from every segment of every track, in recording order.
///
/// The correction accumulates over the whole activity and is never reset at
/// segment or track boundaries: a later segment inherits the pauses removed
/// from earlier ones. Nothing is modified if a corrected timestamp would leave
/// the supported time range.
pub fn remove_pauses(activity: &mut Activity, params: &PauseParams) -> Result<PauseReport> {
    let mut report = PauseReport::default();
    let mut previous_time: Option<DateTime<Utc>> = None;
    let mut correction = Duration::zero();
    let mut corrected = Vec::with_capacity(activity.point_count());

    for point in activity.points() {
        let original = point.time;
        if let Some(previous) = previous_time {
            let diff = original - previous;
            if diff > params.cadence {
                correction = correction.checked_add(&diff).ok_or(
                    GpxToolsError::TimestampOverflow {
                        time: original,
                        delta_s: -correction.num_seconds(),
                    },
                )?;
                report.pauses += 1;
            }
        }
        previous_time = Some(original);
        if correction > Duration::zero() {
            let shift = correction - params.cadence;
            let time = original
                .checked_sub_signed(shift)
                .ok_or(GpxToolsError::TimestampOverflow {
                    time: original,
                    delta_s: -shift.num_seconds(),
                })?;
            corrected.push(time);
            report.points_adjusted += 1;
            report.removed_ms = shift.num_milliseconds();
        } else {
            corrected.push(original);
        }
    }

    for (point, time) in activity.points_mut().zip(corrected) {
        point.time = time;
    }
    Ok(report)
}
