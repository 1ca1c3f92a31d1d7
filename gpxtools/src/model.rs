//! In-memory track hierarchy: activity → tracks → segments → points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Nominal start of the activity (GPX metadata time).
    pub time: Option<DateTime<Utc>>,
    pub tracks: Vec<Track>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    pub segments: Vec<Segment>,
}

/// Points in recording order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl Point {
    pub fn new(time: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            elevation: None,
        }
    }
}

impl Activity {
    pub fn new(time: Option<DateTime<Utc>>, tracks: Vec<Track>) -> Self {
        Self { time, tracks }
    }

    /// All points of all segments of all tracks, in recording order.
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
    }

    pub fn points_mut(&mut self) -> impl Iterator<Item = &mut Point> {
        self.tracks
            .iter_mut()
            .flat_map(|track| track.segments.iter_mut())
            .flat_map(|segment| segment.points.iter_mut())
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.tracks.iter().flat_map(|track| track.segments.iter())
    }

    pub fn point_count(&self) -> usize {
        self.segments().map(|segment| segment.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points().next().is_none()
    }

    pub fn first_point_time(&self) -> Option<DateTime<Utc>> {
        self.points().next().map(|point| point.time)
    }

    pub fn last_point_time(&self) -> Option<DateTime<Utc>> {
        self.points().last().map(|point| point.time)
    }

    /// The nominal start time, falling back to the first recorded point.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.time.or_else(|| self.first_point_time())
    }
}

impl Track {
    pub fn new(name: Option<String>, segments: Vec<Segment>) -> Self {
        Self { name, segments }
    }
}

impl Segment {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn is_monotonic(&self) -> bool {
        self.points.windows(2).all(|pair| pair[0].time <= pair[1].time)
    }
}

/// Builds an activity whose points sit at the given millisecond offsets from
/// `start`, one inner slice per segment, all in a single track.
#[cfg(test)]
pub(crate) fn activity_from_offsets(start: DateTime<Utc>, segments: &[&[i64]]) -> Activity {
    let segments = segments
        .iter()
        .map(|offsets| {
            Segment::new(
                offsets
                    .iter()
                    .enumerate()
                    .map(|(i, ms)| {
                        Point::new(
                            start + chrono::Duration::milliseconds(*ms),
                            45.0 + i as f64 * 1e-4,
                            6.0,
                        )
                    })
                    .collect(),
            )
        })
        .collect();
    Activity::new(Some(start), vec![Track::new(None, segments)])
}

#[cfg(test)]
pub(crate) fn times(activity: &Activity) -> Vec<DateTime<Utc>> {
    activity.points().map(|point| point.time).collect()
}
