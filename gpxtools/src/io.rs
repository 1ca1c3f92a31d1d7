//! GPX decoding and encoding around the [`Activity`] model.
//!
//! The parsed [`gpx::Gpx`] is retained so that the elements the `gpx` crate
//! understands (waypoints, routes, links, track types, ...) are written back.
//! `<extensions>` blocks (heart rate, cadence, temperature) are discarded by
//! the parser and cannot be written back; [`GpxDocument::has_extensions`]
//! reports whether the input carried any.

use std::io::{Read, Write};

use chrono::{DateTime, Datelike, Utc};
use gpx::{Gpx, GpxVersion, Metadata, Time};
use time::OffsetDateTime;

use crate::model::{Activity, Point, Segment, Track};
use crate::{GpxToolsError, Result};

#[derive(Clone, Debug)]
pub struct GpxDocument {
    raw: Gpx,
    has_extensions: bool,
    pub activity: Activity,
}

/// Years a GPX timestamp can be encoded for.
pub const MIN_YEAR: i32 = -9999;
pub const MAX_YEAR: i32 = 9999;

/// Whether `time` can be written back to a GPX document.
pub fn is_encodable(time: &DateTime<Utc>) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&time.year())
}

impl GpxDocument {
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| GpxToolsError::Gpx(e.to_string()))?;
        let raw = gpx::read(bytes.as_slice()).map_err(|e| GpxToolsError::Gpx(e.to_string()))?;
        let mut doc = Self::from_gpx(raw)?;
        doc.has_extensions = bytes
            .windows(b"<extensions".len())
            .any(|window| window == b"<extensions");
        Ok(doc)
    }

    pub fn from_gpx(raw: Gpx) -> Result<Self> {
        let mut tracks = Vec::with_capacity(raw.tracks.len());
        for (ti, track) in raw.tracks.iter().enumerate() {
            let mut segments = Vec::with_capacity(track.segments.len());
            for (si, segment) in track.segments.iter().enumerate() {
                let mut points = Vec::with_capacity(segment.points.len());
                for (pi, waypoint) in segment.points.iter().enumerate() {
                    let time = waypoint.time.clone().ok_or(GpxToolsError::MissingTimestamp {
                        track: ti,
                        segment: si,
                        point: pi,
                    })?;
                    let geo = waypoint.point();
                    points.push(Point {
                        time: to_chrono(time)?,
                        latitude: geo.y(),
                        longitude: geo.x(),
                        elevation: waypoint.elevation,
                    });
                }
                segments.push(Segment::new(points));
            }
            tracks.push(Track::new(track.name.clone(), segments));
        }

        let metadata_time = raw
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.time.clone())
            .map(to_chrono)
            .transpose()?;
        let mut activity = Activity::new(metadata_time, tracks);
        if activity.time.is_none() {
            activity.time = activity.first_point_time();
        }

        Ok(Self {
            raw,
            has_extensions: false,
            activity,
        })
    }

    /// True when the input contained `<extensions>` elements, which are lost
    /// on write.
    pub fn has_extensions(&self) -> bool {
        self.has_extensions
    }

    /// The document as originally parsed.
    pub fn raw(&self) -> &Gpx {
        &self.raw
    }

    /// Copies the model's timestamps into a GPX 1.1 document.
    pub fn to_gpx(&self) -> Result<Gpx> {
        let mut out = self.raw.clone();
        check_layout(&out, &self.activity)?;

        for (track, model_track) in out.tracks.iter_mut().zip(&self.activity.tracks) {
            track.name = model_track.name.clone();
            for (segment, model_segment) in track.segments.iter_mut().zip(&model_track.segments) {
                for (waypoint, point) in segment.points.iter_mut().zip(&model_segment.points) {
                    waypoint.time = Some(to_gpx_time(point.time)?);
                }
            }
        }

        if let Some(time) = self.activity.time {
            out.metadata.get_or_insert_with(Metadata::default).time = Some(to_gpx_time(time)?);
        }
        out.version = GpxVersion::Gpx11;
        Ok(out)
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let out = self.to_gpx()?;
        gpx::write(&out, writer).map_err(|e| GpxToolsError::Gpx(e.to_string()))
    }
}

fn check_layout(raw: &Gpx, activity: &Activity) -> Result<()> {
    if raw.tracks.len() != activity.tracks.len() {
        return Err(GpxToolsError::LayoutMismatch(format!(
            "{} tracks in document, {} in activity",
            raw.tracks.len(),
            activity.tracks.len()
        )));
    }
    for (ti, (track, model_track)) in raw.tracks.iter().zip(&activity.tracks).enumerate() {
        if track.segments.len() != model_track.segments.len() {
            return Err(GpxToolsError::LayoutMismatch(format!(
                "track {}: {} segments in document, {} in activity",
                ti,
                track.segments.len(),
                model_track.segments.len()
            )));
        }
        for (si, (segment, model_segment)) in
            track.segments.iter().zip(&model_track.segments).enumerate()
        {
            if segment.points.len() != model_segment.points.len() {
                return Err(GpxToolsError::LayoutMismatch(format!(
                    "track {} segment {}: {} points in document, {} in activity",
                    ti,
                    si,
                    segment.points.len(),
                    model_segment.points.len()
                )));
            }
        }
    }
    Ok(())
}

fn to_chrono(time: Time) -> Result<DateTime<Utc>> {
    let odt = OffsetDateTime::from(time);
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond()).ok_or_else(|| {
        GpxToolsError::TimeConversion(format!("{} is out of range", odt.unix_timestamp()))
    })
}

fn to_gpx_time(time: DateTime<Utc>) -> Result<Time> {
    let odt = OffsetDateTime::from_unix_timestamp(time.timestamp())
        .and_then(|odt| odt.replace_nanosecond(time.timestamp_subsec_nanos()))
        .map_err(|e| GpxToolsError::TimeConversion(format!("{}: {}", time, e)))?;
    Ok(Time::from(odt))
}
