//! Location samples.
//!
//! - [`RawLocation`] - a fix as delivered by a provider
//! - [`LocationSample`] - the normalized record returned to callers
//!
//! Conversion is a plain field projection; the only platform dependency is
//! vertical accuracy, which older platforms never populate reliably.

use serde::{Deserialize, Serialize};

use crate::platform::{ApiLevel, VERTICAL_ACCURACY_MIN_API};

/// A fix as delivered by a location provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above the WGS84 ellipsoid.
    pub altitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f32,
    pub vertical_accuracy: Option<f32>,
    /// Bearing in degrees.
    pub bearing: f32,
    /// Speed in m/s.
    pub speed: f32,
    /// Fix time in milliseconds since the Unix epoch.
    pub time_ms: i64,
}

impl RawLocation {
    /// Creates a fix with only a position and a timestamp.
    pub fn at(latitude: f64, longitude: f64, time_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            accuracy: 0.0,
            vertical_accuracy: None,
            bearing: 0.0,
            speed: 0.0,
            time_ms,
        }
    }

    /// Age of the fix relative to `now_ms`, never negative.
    pub fn age_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(now_ms.saturating_sub(self.time_ms)).unwrap_or(0)
    }

    /// Projects the fix onto the caller-facing record.
    pub fn to_sample(&self, api_level: ApiLevel) -> LocationSample {
        LocationSample {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            accuracy: self.accuracy,
            altitude_accuracy: if api_level >= VERTICAL_ACCURACY_MIN_API {
                self.vertical_accuracy
            } else {
                None
            },
            heading: self.bearing,
            speed: self.speed,
            timestamp: self.time_ms,
        }
    }
}

/// Normalized location record returned by single fetches and watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub altitude_accuracy: Option<f32>,
    pub heading: f32,
    pub speed: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
