//! Event dispatchers
//!
//! Repositories forward their lifecycle events to an [`EventDispatcher`].
//! Dispatch happens after the engine call returned successfully and cannot
//! fail the call.

use parking_lot::Mutex;
use tracing::debug;

use crate::events::RepositoryEvent;

/// Receiver of repository lifecycle events
pub trait EventDispatcher: Send + Sync {
    /// Handle one event
    fn dispatch(&self, event: &RepositoryEvent);
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn dispatch(&self, _event: &RepositoryEvent) {}
}

/// Emits a `tracing` event per dispatched event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

impl EventDispatcher for TracingDispatcher {
    fn dispatch(&self, event: &RepositoryEvent) {
        debug!(
            target: "trellis::events",
            event = %event.name(),
            items = event.len(),
            "dispatched"
        );
    }
}

/// Keeps every dispatched event in memory, in dispatch order
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<RepositoryEvent>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded event
    pub fn events(&self) -> Vec<RepositoryEvent> {
        self.events.lock().clone()
    }

    /// Names of the recorded events
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(RepositoryEvent::name).collect()
    }

    /// The most recent event
    pub fn last(&self) -> Option<RepositoryEvent> {
        self.events.lock().last().cloned()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forget every recorded event
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: &RepositoryEvent) {
        self.events.lock().push(event.clone());
    }
}
