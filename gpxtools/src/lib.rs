//! Timestamp correction engine for GPX activity tracks.
//!
//! The crate decodes a GPX document into an [`Activity`], applies one of the
//! editing transforms ([`remove_pauses`], [`rebase_timestamps`],
//! [`slow_down`]) in place, and encodes the result back through
//! [`GpxDocument`].

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod io;
pub mod model;
pub mod pause;
pub mod rebase;
pub mod slowdown;
pub mod summary;

pub use io::GpxDocument;
pub use model::{Activity, Point, Segment, Track};
pub use pause::{remove_pauses, PauseParams, PauseReport};
pub use rebase::{rebase_timestamps, RebaseReport, RebaseTarget};
pub use slowdown::{slow_down, SlowDownParams, SlowDownReport};
pub use summary::{summarize, Summary};

#[derive(Error, Debug)]
pub enum GpxToolsError {
    #[error("GPX error: {0}")]
    Gpx(String),
    #[error("point {point} of segment {segment} in track {track} has no timestamp")]
    MissingTimestamp {
        track: usize,
        segment: usize,
        point: usize,
    },
    #[error(
        "invalid date/time {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
    )]
    InvalidDate {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    },
    #[error("activity has no start time to resolve the omitted '{0}' component from")]
    MissingReferenceTime(&'static str),
    #[error("shifting {time} by {delta_s} s leaves the supported time range")]
    TimestampOverflow { time: DateTime<Utc>, delta_s: i64 },
    #[error("timestamp conversion failed: {0}")]
    TimeConversion(String),
    #[error("activity layout no longer matches the GPX document: {0}")]
    LayoutMismatch(String),
}

pub type Result<T> = std::result::Result<T, GpxToolsError>;

/// Great-circle distance in meters between two WGS84 coordinates.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = 6_371_000.0_f64;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    r * c
}
