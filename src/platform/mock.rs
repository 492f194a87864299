//! Scriptable geolocation and permission capabilities for testing and development

use crate::core::{PermissionState, Position, PositionError, PositionOptions, WatchId};
use crate::platform::{
    FixCallback, FixResult, GeolocationProvider, PermissionListener, PermissionQuery, WatchCallback,
};
use crate::utils::lock;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Record of the primitive calls a mock provider has received
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub get_current_position: usize,
    pub watch_position: usize,
    /// Identifiers passed to `clear_watch`, in call order
    pub cleared: Vec<WatchId>,
    pub last_options: Option<PositionOptions>,
}

impl CallLog {
    /// Total number of primitive calls of any kind
    pub fn total(&self) -> usize {
        self.get_current_position + self.watch_position + self.cleared.len()
    }
}

type SharedWatch = Arc<Mutex<WatchCallback>>;

#[derive(Default)]
struct MockState {
    next_watch_id: u32,
    watches: Vec<(WatchId, SharedWatch)>,
    pending_fixes: VecDeque<FixCallback>,
    fix_response: Option<FixResult>,
    calls: CallLog,
}

/// Mock geolocation provider
///
/// One-shot requests are answered immediately when a response has been
/// scripted with [`MockGeolocation::respond_with`], otherwise they stay parked
/// until [`MockGeolocation::complete_fix`]. Watch updates are pushed with
/// [`MockGeolocation::emit_position`] and [`MockGeolocation::emit_error`].
#[derive(Default)]
pub struct MockGeolocation {
    state: Mutex<MockState>,
}

impl MockGeolocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every future one-shot request with `response`
    pub fn respond_with(&self, response: FixResult) {
        lock(&self.state).fix_response = Some(response);
    }

    /// Answer the oldest parked one-shot request
    ///
    /// Returns false when no request was waiting.
    pub fn complete_fix(&self, response: FixResult) -> bool {
        let callback = lock(&self.state).pending_fixes.pop_front();
        match callback {
            Some(callback) => {
                callback(response);
                true
            }
            None => false,
        }
    }

    /// Drop the oldest parked request without answering it
    pub fn abandon_fix(&self) -> bool {
        lock(&self.state).pending_fixes.pop_front().is_some()
    }

    pub fn pending_fix_count(&self) -> usize {
        lock(&self.state).pending_fixes.len()
    }

    /// Deliver `result` to every registered watch, returning how many were notified
    pub fn emit(&self, result: FixResult) -> usize {
        let watches: Vec<(WatchId, SharedWatch)> = lock(&self.state).watches.clone();
        let mut notified = 0;

        for (id, watch) in watches {
            // A previous callback in this round may have released the watch
            if !self.is_watch_active(id) {
                continue;
            }
            let mut guard = lock(&watch);
            let callback = &mut *guard;
            callback(result.clone());
            notified += 1;
        }

        notified
    }

    pub fn emit_position(&self, position: Position) -> usize {
        self.emit(Ok(position))
    }

    pub fn emit_error(&self, error: PositionError) -> usize {
        self.emit(Err(error))
    }

    pub fn is_watch_active(&self, id: WatchId) -> bool {
        lock(&self.state).watches.iter().any(|(watch_id, _)| *watch_id == id)
    }

    pub fn active_watch_count(&self) -> usize {
        lock(&self.state).watches.len()
    }

    /// Snapshot of the calls received so far
    pub fn calls(&self) -> CallLog {
        lock(&self.state).calls.clone()
    }
}

impl GeolocationProvider for MockGeolocation {
    fn get_current_position(&self, options: &PositionOptions, callback: FixCallback) {
        let response = {
            let mut state = lock(&self.state);
            state.calls.get_current_position += 1;
            state.calls.last_options = Some(options.clone());

            match state.fix_response.clone() {
                Some(response) => Some((response, callback)),
                None => {
                    state.pending_fixes.push_back(callback);
                    None
                }
            }
        };

        // Answer outside the lock so the callback may call back into the provider
        if let Some((response, callback)) = response {
            callback(response);
        }
    }

    fn watch_position(&self, options: &PositionOptions, callback: WatchCallback) -> WatchId {
        let mut state = lock(&self.state);
        state.calls.watch_position += 1;
        state.calls.last_options = Some(options.clone());

        state.next_watch_id += 1;
        let id = WatchId::new(state.next_watch_id);
        state.watches.push((id, Arc::new(Mutex::new(callback))));
        id
    }

    fn clear_watch(&self, id: WatchId) {
        let mut state = lock(&self.state);
        state.calls.cleared.push(id);
        state.watches.retain(|(watch_id, _)| *watch_id != id);
    }
}

type SharedListener = Arc<dyn Fn(PermissionState) -> bool + Send + Sync>;

struct PermissionsState {
    current: PermissionState,
    deferred: bool,
    listeners: Vec<SharedListener>,
    queries: Vec<String>,
}

/// Mock permission capability
pub struct MockPermissions {
    state: Mutex<PermissionsState>,
}

impl MockPermissions {
    /// Answer queries immediately with `state`
    pub fn new(state: PermissionState) -> Self {
        Self::build(state, false)
    }

    /// Hold answers back until [`MockPermissions::resolve`]
    pub fn deferred(state: PermissionState) -> Self {
        Self::build(state, true)
    }

    fn build(current: PermissionState, deferred: bool) -> Self {
        Self {
            state: Mutex::new(PermissionsState {
                current,
                deferred,
                listeners: Vec::new(),
                queries: Vec::new(),
            }),
        }
    }

    /// Deliver the current state to every listener registered so far
    pub fn resolve(&self) {
        let (current, listeners) = {
            let mut state = lock(&self.state);
            state.deferred = false;
            (state.current, state.listeners.clone())
        };
        self.notify(listeners, current);
    }

    /// Change the permission and notify listeners
    pub fn set_state(&self, new_state: PermissionState) {
        let listeners = {
            let mut state = lock(&self.state);
            state.current = new_state;
            if state.deferred {
                return;
            }
            state.listeners.clone()
        };
        self.notify(listeners, new_state);
    }

    /// Call each listener outside the lock and drop the ones that opted out
    fn notify(&self, listeners: Vec<SharedListener>, permission: PermissionState) {
        let finished: Vec<SharedListener> = listeners
            .into_iter()
            .filter(|listener| !listener(permission))
            .collect();
        self.forget(&finished);
    }

    fn forget(&self, finished: &[SharedListener]) {
        if finished.is_empty() {
            return;
        }
        lock(&self.state)
            .listeners
            .retain(|listener| !finished.iter().any(|done| Arc::ptr_eq(done, listener)));
    }

    /// Capability names queried so far
    pub fn queries(&self) -> Vec<String> {
        lock(&self.state).queries.clone()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

impl PermissionQuery for MockPermissions {
    fn query(&self, capability: &str, listener: PermissionListener) {
        let listener: SharedListener = Arc::from(listener);
        let answer = {
            let mut state = lock(&self.state);
            state.queries.push(capability.to_string());
            state.listeners.push(Arc::clone(&listener));
            (!state.deferred).then_some(state.current)
        };

        if let Some(current) = answer {
            if !listener(current) {
                self.forget(&[listener]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_scripted_fix_is_answered_immediately() {
        let mock = MockGeolocation::new();
        mock.respond_with(Ok(Position::new(1.0, 2.0, 3.0)));

        let answered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&answered);
        mock.get_current_position(
            &PositionOptions::default(),
            Box::new(move |result: FixResult| {
                assert!(result.is_ok());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(answered.load(Ordering::SeqCst), 1);
        assert_eq!(mock.pending_fix_count(), 0);
        assert_eq!(mock.calls().get_current_position, 1);
    }

    #[test]
    fn test_parked_fix() {
        let mock = MockGeolocation::new();
        mock.get_current_position(&PositionOptions::default(), Box::new(|_| {}));
        assert_eq!(mock.pending_fix_count(), 1);

        assert!(mock.complete_fix(Err(PositionError::timeout("expired"))));
        assert!(!mock.complete_fix(Err(PositionError::timeout("expired"))));
    }

    #[test]
    fn test_watch_lifecycle() {
        let mock = MockGeolocation::new();
        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);

        let id = mock.watch_position(
            &PositionOptions::default(),
            Box::new(move |_: FixResult| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(mock.is_watch_active(id));

        assert_eq!(mock.emit_position(Position::new(0.0, 0.0, 1.0)), 1);
        assert_eq!(mock.emit_error(PositionError::position_unavailable("lost")), 1);
        assert_eq!(updates.load(Ordering::SeqCst), 2);

        mock.clear_watch(id);
        assert!(!mock.is_watch_active(id));
        assert_eq!(mock.emit_position(Position::new(0.0, 0.0, 1.0)), 0);
        assert_eq!(mock.calls().cleared, vec![id]);
    }

    #[test]
    fn test_watch_ids_are_unique() {
        let mock = MockGeolocation::new();
        let first = mock.watch_position(&PositionOptions::default(), Box::new(|_| {}));
        let second = mock.watch_position(&PositionOptions::default(), Box::new(|_| {}));
        assert_ne!(first, second);
        assert_eq!(mock.active_watch_count(), 2);
    }

    #[test]
    fn test_permissions_immediate_and_change() {
        let permissions = MockPermissions::new(PermissionState::Prompt);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        permissions.query(
            "geolocation",
            Box::new(move |state: PermissionState| {
                sink.lock().unwrap().push(state);
                true
            }),
        );
        permissions.set_state(PermissionState::Granted);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PermissionState::Prompt, PermissionState::Granted]
        );
        assert_eq!(permissions.queries(), vec!["geolocation".to_string()]);
    }

    #[test]
    fn test_permissions_deferred() {
        let permissions = MockPermissions::deferred(PermissionState::Denied);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        permissions.query(
            "geolocation",
            Box::new(move |state: PermissionState| {
                sink.lock().unwrap().push(state);
                true
            }),
        );
        assert!(seen.lock().unwrap().is_empty());

        permissions.resolve();
        assert_eq!(*seen.lock().unwrap(), vec![PermissionState::Denied]);
    }

    #[test]
    fn test_listener_dropped_after_opting_out() {
        let permissions = MockPermissions::new(PermissionState::Prompt);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        permissions.query(
            "geolocation",
            Box::new(move |_: PermissionState| counter.fetch_add(1, Ordering::SeqCst) == 0),
        );
        // The initial answer keeps it registered; the first change releases it
        assert_eq!(permissions.listener_count(), 1);
        permissions.set_state(PermissionState::Granted);
        assert_eq!(permissions.listener_count(), 0);

        permissions.set_state(PermissionState::Denied);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
