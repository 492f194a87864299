//! Device position tracking
//!
//! A single state manager around a platform geolocation capability: one-shot
//! fixes, a continuous watch, the latest position and error, the mirrored
//! permission state and a replaying stream of position updates.

pub mod core;
pub mod platform;
pub mod tracker;
pub mod display;
pub mod utils;

// Re-export commonly used types
pub use core::{
    Position, Coordinates, PositionOptions, PermissionState, WatchId,
    PositionError, PositionErrorKind, FindError,
};
pub use platform::{
    Platform, GeolocationProvider, PermissionQuery, FixCallback, WatchCallback, PermissionListener,
    MockGeolocation, MockPermissions, SimulatedGeolocation,
};
pub use tracker::{PositionTracker, PositionStream, PositionSubscription, SubscriptionError};
pub use display::{PositionHistory, OutputFormat, StatusReport};
pub use utils::{TrackerConfig, SimulationConfig, ConfigError};
