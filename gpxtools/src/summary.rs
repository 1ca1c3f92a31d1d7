//! Read-only activity statistics (counts, elapsed time, pauses, distance).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::haversine_distance;
use crate::model::Activity;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub tracks: usize,
    pub segments: usize,
    pub points: usize,
    pub track_names: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub first_point_time: Option<DateTime<Utc>>,
    pub last_point_time: Option<DateTime<Utc>>,
    pub elapsed_s: f64,
    pub pauses: usize,
    pub paused_s: f64,
    pub moving_s: f64,
    pub distance_m: f64,
}

/// Statistics over the whole activity. Gaps longer than `cadence` between
/// consecutive points count as pauses; distance is summed within segments only.
pub fn summarize(activity: &Activity, cadence: Duration) -> Summary {
    let mut pauses = 0;
    let mut paused = Duration::zero();
    let mut previous: Option<DateTime<Utc>> = None;
    for point in activity.points() {
        if let Some(prev) = previous {
            let diff = point.time - prev;
            if diff > cadence {
                pauses += 1;
                paused += diff - cadence;
            }
        }
        previous = Some(point.time);
    }

    let distance_m = activity
        .segments()
        .map(|segment| {
            segment
                .points
                .windows(2)
                .map(|pair| {
                    haversine_distance(
                        pair[0].latitude,
                        pair[0].longitude,
                        pair[1].latitude,
                        pair[1].longitude,
                    )
                })
                .sum::<f64>()
        })
        .sum();

    let first_point_time = activity.first_point_time();
    let last_point_time = activity.last_point_time();
    let elapsed_s = match (first_point_time, last_point_time) {
        (Some(first), Some(last)) => seconds(last - first),
        _ => 0.0,
    };
    let paused_s = seconds(paused);

    Summary {
        tracks: activity.tracks.len(),
        segments: activity.segments().count(),
        points: activity.point_count(),
        track_names: activity
            .tracks
            .iter()
            .filter_map(|track| track.name.clone())
            .collect(),
        start_time: activity.time,
        first_point_time,
        last_point_time,
        elapsed_s,
        pauses,
        paused_s,
        moving_s: elapsed_s - paused_s,
        distance_m,
    }
}

fn seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}
