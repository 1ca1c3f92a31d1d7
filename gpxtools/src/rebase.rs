//! Shifts every timestamp so the activity starts at a chosen date/time.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::io::is_encodable;
use crate::model::Activity;
use crate::{GpxToolsError, Result};

/// Target start, component by component. `None` keeps the activity's current
/// value for that component. Components are read as UTC.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseTarget {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RebaseReport {
    pub previous_start: Option<DateTime<Utc>>,
    pub new_start: DateTime<Utc>,
    pub delta_s: i64,
    pub points_shifted: usize,
}

impl RebaseTarget {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            year: Some(time.year()),
            month: Some(time.month()),
            day: Some(time.day()),
            hour: Some(time.hour()),
            minute: Some(time.minute()),
            second: Some(time.second()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fills omitted components from `reference` and builds the target instant.
    pub fn resolve(&self, reference: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
        fn pick<T>(
            value: Option<T>,
            reference: Option<DateTime<Utc>>,
            name: &'static str,
            get: impl Fn(&DateTime<Utc>) -> T,
        ) -> Result<T> {
            match (value, reference) {
                (Some(v), _) => Ok(v),
                (None, Some(r)) => Ok(get(&r)),
                (None, None) => Err(GpxToolsError::MissingReferenceTime(name)),
            }
        }

        let year = pick(self.year, reference, "year", |r| r.year())?;
        let month = pick(self.month, reference, "month", |r| r.month())?;
        let day = pick(self.day, reference, "day", |r| r.day())?;
        let hour = pick(self.hour, reference, "hour", |r| r.hour())?;
        let minute = pick(self.minute, reference, "minute", |r| r.minute())?;
        let second = pick(self.second, reference, "second", |r| r.second())?;

        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .ok_or(GpxToolsError::InvalidDate {
                year,
                month,
                day,
                hour,
                minute,
                second,
            })
    }
}

/// Moves the activity so it starts at `target`, shifting every point by the
/// same delta.
///
/// Nothing is modified unless the target is a valid date/time and every
/// shifted point can still be written to GPX.
pub fn rebase_timestamps(activity: &mut Activity, target: &RebaseTarget) -> Result<RebaseReport> {
    let reference = activity.reference_time();
    let new_start = target.resolve(reference)?;
    let delta = reference.map_or_else(Duration::zero, |r| new_start - r);
    let overflow = |time| GpxToolsError::TimestampOverflow {
        time,
        delta_s: delta.num_seconds(),
    };

    if !is_encodable(&new_start) {
        return Err(overflow(reference.unwrap_or(new_start)));
    }
    for point in activity.points() {
        match point.time.checked_add_signed(delta) {
            Some(shifted) if is_encodable(&shifted) => {}
            _ => return Err(overflow(point.time)),
        }
    }

    let previous_start = activity.time;
    activity.time = Some(new_start);
    let mut points_shifted = 0;
    for point in activity.points_mut() {
        point.time += delta;
        points_shifted += 1;
    }

    Ok(RebaseReport {
        previous_start,
        new_start,
        delta_s: delta.num_seconds(),
        points_shifted,
    })
}
