//! Platform abstraction for geolocation and permission capabilities
//!
//! The tracker never talks to a positioning backend directly. It receives a
//! [`Platform`] bundle holding an optional [`GeolocationProvider`] (absent when
//! the host has no geolocation capability) and an optional [`PermissionQuery`]
//! (absent when the host cannot report permission status).

pub mod mock;
pub mod simulated;

pub use mock::{MockGeolocation, MockPermissions, CallLog};
pub use simulated::SimulatedGeolocation;

use crate::core::{PermissionState, Position, PositionError, PositionOptions, WatchId};
use std::fmt;
use std::sync::Arc;

/// Outcome of a single fix request or watch update
pub type FixResult = Result<Position, PositionError>;

/// Callback for a one-shot fix; invoked at most once
pub type FixCallback = Box<dyn FnOnce(FixResult) + Send>;

/// Callback for a continuous watch; invoked once per update
pub type WatchCallback = Box<dyn FnMut(FixResult) + Send>;

/// Listener for permission status; invoked with the initial state and on each change
///
/// Returns false once it is no longer interested, after which the capability
/// drops it.
pub type PermissionListener = Box<dyn Fn(PermissionState) -> bool + Send + Sync>;

/// Native geolocation primitives
///
/// Callbacks may run synchronously inside the call or later from another
/// task or thread.
pub trait GeolocationProvider: Send + Sync {
    /// Request a single fix
    fn get_current_position(&self, options: &PositionOptions, callback: FixCallback);

    /// Register a continuous watch and return its identifier
    fn watch_position(&self, options: &PositionOptions, callback: WatchCallback) -> WatchId;

    /// Release a watch; unknown identifiers are ignored
    fn clear_watch(&self, id: WatchId);
}

/// Optional permission-status capability
pub trait PermissionQuery: Send + Sync {
    /// Ask for the permission status of `capability` and keep `listener` informed
    fn query(&self, capability: &str, listener: PermissionListener);
}

/// Capabilities exposed by the host
#[derive(Clone, Default)]
pub struct Platform {
    geolocation: Option<Arc<dyn GeolocationProvider>>,
    permissions: Option<Arc<dyn PermissionQuery>>,
}

impl Platform {
    /// A host without any geolocation or permission capability
    pub fn unsupported() -> Self {
        Self::default()
    }

    pub fn with_geolocation(mut self, provider: Arc<dyn GeolocationProvider>) -> Self {
        self.geolocation = Some(provider);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionQuery>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn geolocation(&self) -> Option<&Arc<dyn GeolocationProvider>> {
        self.geolocation.as_ref()
    }

    pub fn permissions(&self) -> Option<&Arc<dyn PermissionQuery>> {
        self.permissions.as_ref()
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("geolocation", &self.geolocation.is_some())
            .field("permissions", &self.permissions.is_some())
            .finish()
    }
}
