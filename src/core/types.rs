//! Core data types for the position tracker

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Coordinate snapshot of a single fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Radius of the 95% confidence circle (meters)
    pub accuracy: f64,
    /// Height above the WGS84 ellipsoid (meters)
    pub altitude: Option<f64>,
    /// Accuracy of `altitude` (meters)
    pub altitude_accuracy: Option<f64>,
    /// Direction of travel, clockwise from true north (degrees)
    pub heading: Option<f64>,
    /// Ground speed (meters per second)
    pub speed: Option<f64>,
}

/// A timestamped fix
///
/// Positions are never mutated once captured; every update produces a new
/// value and consumers always receive their own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub timestamp_ms: u64,
    pub coords: Coordinates,
}

impl Position {
    /// Create a fix stamped with the current time
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            timestamp_ms: now_ms(),
            coords: Coordinates {
                latitude,
                longitude,
                accuracy,
                altitude: None,
                altitude_accuracy: None,
                heading: None,
                speed: None,
            },
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_altitude(mut self, altitude: f64, altitude_accuracy: Option<f64>) -> Self {
        self.coords.altitude = Some(altitude);
        self.coords.altitude_accuracy = altitude_accuracy;
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.coords.heading = Some(heading);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.coords.speed = Some(speed);
        self
    }

    /// Age of this fix relative to `now_ms`
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.timestamp_ms))
    }
}

/// Platform permission status for a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    Unknown,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
            PermissionState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Identifier of an active continuous watch, issued by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u32);

impl WatchId {
    pub fn new(id: u32) -> Self {
        WatchId(id)
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// Request parameters handed to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    /// Ask for the best possible fix at the cost of power
    pub enable_high_accuracy: bool,
    /// Maximum wait for a fix; `None` leaves the wait unbounded
    pub timeout_ms: Option<u64>,
    /// Maximum age of a cached fix the provider may return; 0 forces a fresh fix
    pub maximum_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout_ms: None,
            maximum_age_ms: 0,
        }
    }
}

impl PositionOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_millis(self.maximum_age_ms)
    }
}
