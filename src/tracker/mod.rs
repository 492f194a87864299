//! Position tracking state manager
//!
//! [`PositionTracker`] is the single source of truth for where the device is
//! and what went wrong last. It wraps the platform's one-shot fix, continuous
//! watch and watch release primitives, keeps the latest position and error,
//! mirrors the geolocation permission and publishes every fix on a replaying
//! [`PositionStream`].
//!
//! Failures never escape `track_me`/`stop_track_me`; they are observable only
//! through [`PositionTracker::position_error`] and the log. `find_me` reports
//! them through its result. An unsupported platform is logged, and `find_me`
//! answers it with [`FindError::CapabilityAbsent`], so callers check
//! [`PositionTracker::is_supported`] to tell "unsupported" from "no fix yet".

pub mod stream;

pub use stream::{PositionStream, PositionSubscription, SubscriptionError};

use crate::core::{
    FindError, PermissionState, Position, PositionError, PositionOptions, WatchId,
    GEOLOCATION_CAPABILITY,
};
use crate::platform::{FixResult, GeolocationProvider, Platform};
use crate::utils::config::TrackerConfig;
use crate::utils::lock;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::oneshot;

/// Tracking handle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Idle,
    /// `watch_position` has been called but has not returned its id yet
    Starting { session: u64 },
    Active { session: u64, id: WatchId },
}

impl WatchState {
    fn is_session(&self, session: u64) -> bool {
        match self {
            WatchState::Idle => false,
            WatchState::Starting { session: current }
            | WatchState::Active { session: current, .. } => *current == session,
        }
    }

    fn active_id(&self) -> Option<WatchId> {
        match self {
            WatchState::Active { id, .. } => Some(*id),
            _ => None,
        }
    }
}

struct TrackerState {
    last_position: Option<Position>,
    position_error: Option<PositionError>,
    permission_state: Option<PermissionState>,
    watch: WatchState,
    next_session: u64,
}

struct TrackerInner {
    geolocation: Option<Arc<dyn GeolocationProvider>>,
    options: PositionOptions,
    state: Mutex<TrackerState>,
    stream: PositionStream,
}

impl TrackerInner {
    fn handle_absence(&self) {
        info!("Geolocation is not supported on this platform");
    }

    fn store_position(&self, state: &mut TrackerState, position: Position) {
        debug!("Position update: {:?}", position);
        state.last_position = Some(position.clone());
        self.stream.publish(position);
    }

    /// Store the error and drop out of tracking, returning the watch to release
    fn store_error(
        &self,
        state: &mut TrackerState,
        position_error: PositionError,
    ) -> Option<WatchId> {
        error!("Position error: {}", position_error);
        let released = state.watch.active_id();
        state.watch = WatchState::Idle;
        state.position_error = Some(position_error);
        released
    }

    fn release(&self, id: WatchId) {
        if let Some(geolocation) = &self.geolocation {
            geolocation.clear_watch(id);
        }
    }

    fn apply(&self, state: &mut TrackerState, result: FixResult) -> Option<WatchId> {
        match result {
            Ok(position) => {
                self.store_position(state, position);
                None
            }
            Err(position_error) => self.store_error(state, position_error),
        }
    }

    fn record(&self, result: FixResult) {
        let released = self.apply(&mut lock(&self.state), result);
        if let Some(id) = released {
            self.release(id);
        }
    }

    fn on_watch_update(&self, session: u64, result: FixResult) {
        let released = {
            let mut state = lock(&self.state);
            if !state.watch.is_session(session) {
                debug!("Discarding update from released watch session {}", session);
                return;
            }
            self.apply(&mut state, result)
        };

        if let Some(id) = released {
            self.release(id);
        }
    }

    fn set_permission_state(&self, permission: PermissionState) {
        debug!("Geolocation permission: {}", permission);
        lock(&self.state).permission_state = Some(permission);
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        let active = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .watch
            .active_id();
        if let Some(id) = active {
            self.release(id);
        }
    }
}

/// Shared handle to the position tracking state
///
/// Cloning the handle shares the same state; construct one per application
/// and pass it to every consumer.
#[derive(Clone)]
pub struct PositionTracker {
    inner: Arc<TrackerInner>,
}

impl PositionTracker {
    pub fn new(platform: Platform, config: &TrackerConfig) -> Self {
        let inner = Arc::new(TrackerInner {
            geolocation: platform.geolocation().cloned(),
            options: config.options.clone(),
            state: Mutex::new(TrackerState {
                last_position: None,
                position_error: None,
                permission_state: None,
                watch: WatchState::Idle,
                next_session: 0,
            }),
            stream: PositionStream::new(config.stream_capacity),
        });

        if let Some(permissions) = platform.permissions() {
            let weak: Weak<TrackerInner> = Arc::downgrade(&inner);
            permissions.query(
                GEOLOCATION_CAPABILITY,
                Box::new(move |permission: PermissionState| match weak.upgrade() {
                    Some(inner) => {
                        inner.set_permission_state(permission);
                        true
                    }
                    // Tracker is gone; stop listening
                    None => false,
                }),
            );
        }

        Self { inner }
    }

    /// True if the platform offers a geolocation capability
    pub fn is_supported(&self) -> bool {
        self.inner.geolocation.is_some()
    }

    pub fn options(&self) -> &PositionOptions {
        &self.inner.options
    }

    /// Get the current position of the device once
    pub async fn find_me(&self) -> Result<Position, FindError> {
        let Some(geolocation) = self.inner.geolocation.clone() else {
            self.inner.handle_absence();
            return Err(FindError::CapabilityAbsent);
        };

        let (tx, rx) = oneshot::channel();
        let weak = Arc::downgrade(&self.inner);
        geolocation.get_current_position(
            &self.inner.options,
            Box::new(move |result: FixResult| {
                if let Some(inner) = weak.upgrade() {
                    inner.record(result.clone());
                }
                let _ = tx.send(result.map_err(FindError::Position));
            }),
        );

        rx.await.unwrap_or(Err(FindError::Abandoned))
    }

    /// Keep the last position updated each time the device moves
    pub fn track_me(&self) {
        let Some(geolocation) = self.inner.geolocation.clone() else {
            self.inner.handle_absence();
            return;
        };

        let session = {
            let mut state = lock(&self.inner.state);
            if state.watch != WatchState::Idle {
                info!("Already tracking");
                return;
            }
            state.next_session += 1;
            let session = state.next_session;
            state.watch = WatchState::Starting { session };
            session
        };

        let weak = Arc::downgrade(&self.inner);
        let id = geolocation.watch_position(
            &self.inner.options,
            Box::new(move |result: FixResult| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_watch_update(session, result);
                }
            }),
        );

        let registered = {
            let mut state = lock(&self.inner.state);
            if state.watch == (WatchState::Starting { session }) {
                state.watch = WatchState::Active { session, id };
                true
            } else {
                false
            }
        };

        if registered {
            debug!("Tracking started with {}", id);
        } else {
            // Stopped or failed while the provider was registering the watch
            geolocation.clear_watch(id);
        }
    }

    /// Stop watching the device position
    pub fn stop_track_me(&self) {
        let Some(geolocation) = self.inner.geolocation.clone() else {
            self.inner.handle_absence();
            return;
        };

        let released = {
            let mut state = lock(&self.inner.state);
            if state.watch == WatchState::Idle {
                debug!("Not tracking, nothing to stop");
                return;
            }
            let released = state.watch.active_id();
            state.watch = WatchState::Idle;
            released
        };

        if let Some(id) = released {
            geolocation.clear_watch(id);
            info!("Tracking stopped, released {}", id);
        }
    }

    pub fn is_tracking(&self) -> bool {
        lock(&self.inner.state).watch != WatchState::Idle
    }

    pub fn last_position(&self) -> Option<Position> {
        lock(&self.inner.state).last_position.clone()
    }

    pub fn position_error(&self) -> Option<PositionError> {
        lock(&self.inner.state).position_error.clone()
    }

    /// Mirrored permission, `None` until (or unless) the platform reports it
    pub fn permission_state(&self) -> Option<PermissionState> {
        lock(&self.inner.state).permission_state
    }

    /// Subscribe to position updates, starting with the latest value
    pub fn subscribe(&self) -> PositionSubscription {
        self.inner.stream.subscribe()
    }
}
