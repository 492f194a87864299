//! Simulated geolocation provider driven by tokio timers
//!
//! Produces a random walk around a configured origin. Each watch runs as its
//! own task on the runtime handed to [`SimulatedGeolocation::new`].

use crate::core::{
    now_ms, PermissionState, Position, PositionError, PositionOptions, WatchId, METERS_PER_DEGREE,
};
use crate::platform::{FixCallback, FixResult, GeolocationProvider, WatchCallback};
use crate::utils::config::SimulationConfig;
use crate::utils::lock;
use log::debug;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const HIGH_ACCURACY_RADIUS_M: f64 = 5.0;
const LOW_ACCURACY_RADIUS_M: f64 = 50.0;

struct Walk {
    config: SimulationConfig,
    latitude: f64,
    longitude: f64,
    last_fix: Option<Position>,
    fixes_produced: u64,
}

impl Walk {
    fn new(config: SimulationConfig) -> Self {
        Self {
            latitude: config.origin_latitude,
            longitude: config.origin_longitude,
            config,
            last_fix: None,
            fixes_produced: 0,
        }
    }

    /// Cached fix still fresh enough for `options`
    fn cached(&self, options: &PositionOptions) -> Option<Position> {
        if options.maximum_age_ms == 0 {
            return None;
        }
        self.last_fix
            .as_ref()
            .filter(|fix| fix.age(now_ms()) <= options.maximum_age())
            .cloned()
    }

    fn next_fix(&mut self, options: &PositionOptions) -> FixResult {
        if self.config.permission == PermissionState::Denied {
            return Err(PositionError::permission_denied("User denied Geolocation"));
        }

        let mut rng = rand::rng();
        if rng.random_bool(self.config.error_probability.clamp(0.0, 1.0)) {
            return Err(PositionError::position_unavailable("Position update is unavailable"));
        }

        // Advance the walk; the first fix sits exactly on the origin
        let bearing_deg: f64 = rng.random_range(0.0..360.0);
        if self.fixes_produced > 0 {
            let bearing = bearing_deg.to_radians();
            let north_m = self.config.step_m * bearing.cos();
            let east_m = self.config.step_m * bearing.sin();
            let lat_scale = self.latitude.to_radians().cos().abs().max(1e-6);

            self.latitude = (self.latitude + north_m / METERS_PER_DEGREE).clamp(-90.0, 90.0);
            self.longitude += east_m / (METERS_PER_DEGREE * lat_scale);
            if self.longitude > 180.0 {
                self.longitude -= 360.0;
            } else if self.longitude < -180.0 {
                self.longitude += 360.0;
            }
        }

        let radius = if options.enable_high_accuracy {
            HIGH_ACCURACY_RADIUS_M
        } else {
            LOW_ACCURACY_RADIUS_M
        };
        let accuracy = radius * rng.random_range(0.5..1.5);

        let mut fix = Position::new(self.latitude, self.longitude, accuracy);
        if self.fixes_produced > 0 {
            let interval_s = (self.config.interval_ms.max(1) as f64) / 1000.0;
            fix = fix
                .with_heading(bearing_deg)
                .with_speed(self.config.step_m / interval_s);
        }
        if let Some(altitude) = self.config.altitude_m {
            fix = fix.with_altitude(altitude, Some(accuracy * 1.5));
        }

        self.fixes_produced += 1;
        self.last_fix = Some(fix.clone());
        Ok(fix)
    }
}

/// Wait for one acquisition, honouring the request timeout
async fn acquire(walk: &Mutex<Walk>, options: &PositionOptions, delay: Duration) -> FixResult {
    if let Some(timeout) = options.timeout() {
        if delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(PositionError::timeout("Timeout expired"));
        }
    }
    tokio::time::sleep(delay).await;
    lock(walk).next_fix(options)
}

/// Random-walk geolocation provider
pub struct SimulatedGeolocation {
    walk: Arc<Mutex<Walk>>,
    runtime: Handle,
    watches: Mutex<HashMap<WatchId, JoinHandle<()>>>,
    next_watch_id: Mutex<u32>,
    fix_delay: Duration,
    interval: Duration,
}

impl SimulatedGeolocation {
    pub fn new(config: SimulationConfig, runtime: Handle) -> Self {
        Self {
            fix_delay: Duration::from_millis(config.fix_delay_ms),
            interval: Duration::from_millis(config.interval_ms),
            walk: Arc::new(Mutex::new(Walk::new(config))),
            runtime,
            watches: Mutex::new(HashMap::new()),
            next_watch_id: Mutex::new(0),
        }
    }

    pub fn active_watch_count(&self) -> usize {
        lock(&self.watches).len()
    }

    /// Number of fresh fixes produced so far; cached answers are not counted
    pub fn fixes_produced(&self) -> u64 {
        lock(&self.walk).fixes_produced
    }
}

impl GeolocationProvider for SimulatedGeolocation {
    fn get_current_position(&self, options: &PositionOptions, callback: FixCallback) {
        let cached = lock(&self.walk).cached(options);
        let walk = Arc::clone(&self.walk);
        let options = options.clone();
        let delay = self.fix_delay;

        self.runtime.spawn(async move {
            let result = match cached {
                Some(fix) => Ok(fix),
                None => acquire(&walk, &options, delay).await,
            };
            callback(result);
        });
    }

    fn watch_position(&self, options: &PositionOptions, mut callback: WatchCallback) -> WatchId {
        let id = {
            let mut next = lock(&self.next_watch_id);
            *next += 1;
            WatchId::new(*next)
        };

        let walk = Arc::clone(&self.walk);
        let options = options.clone();
        let fix_delay = self.fix_delay;
        let interval = self.interval;

        // Registered under the lock so a release issued from the first
        // callback always finds the task
        let mut watches = lock(&self.watches);
        let task = self.runtime.spawn(async move {
            let mut first = true;
            loop {
                if !first {
                    tokio::time::sleep(interval).await;
                }
                first = false;
                let result = acquire(&walk, &options, fix_delay).await;
                callback(result);
            }
        });
        watches.insert(id, task);

        debug!("Simulated {} started", id);
        id
    }

    fn clear_watch(&self, id: WatchId) {
        if let Some(task) = lock(&self.watches).remove(&id) {
            debug!("Simulated {} cleared", id);
            task.abort();
        }
    }
}

impl Drop for SimulatedGeolocation {
    fn drop(&mut self) {
        for (_, task) in lock(&self.watches).drain() {
            task.abort();
        }
    }
}
