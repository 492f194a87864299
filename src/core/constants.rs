//! Capability names and defaults

/// Permission capability name queried for geolocation access
pub const GEOLOCATION_CAPABILITY: &str = "geolocation";

/// Default number of unread updates a stream subscriber may fall behind
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Meters per degree of latitude (spherical approximation)
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Largest accepted stream buffer; the broadcast channel preallocates it
pub const MAX_STREAM_CAPACITY: usize = 1 << 16;

/// Largest accepted display history length
pub const MAX_HISTORY_LIMIT: usize = 1 << 20;
