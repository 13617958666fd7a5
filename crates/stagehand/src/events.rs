//! Counters for named application events.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

/// Counts and history of named events, recorded by application hooks and
/// queried by tests.
#[derive(Debug, Default)]
pub struct EventTracker {
    /// Guarded state.
    inner: Mutex<Tracked>,
}

/// Counts plus firing order.
#[derive(Debug, Default)]
struct Tracked {
    /// Times each event fired.
    counts: HashMap<String, usize>,
    /// Every firing in order.
    history: Vec<String>,
}

impl EventTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one firing of `name`.
    pub fn record(&self, name: &str) {
        let mut t = self.inner.lock();
        *t.counts.entry(name.to_string()).or_default() += 1;
        t.history.push(name.to_string());
        trace!(event = name, "event_recorded");
    }

    /// Forget everything.
    pub fn clear(&self) {
        let mut t = self.inner.lock();
        t.counts.clear();
        t.history.clear();
    }

    /// Whether `name` fired at least `min` times.
    pub fn was_fired(&self, name: &str, min: usize) -> bool {
        self.count(name) >= min.max(1)
    }

    /// Times `name` fired.
    pub fn count(&self, name: &str) -> usize {
        self.inner.lock().counts.get(name).copied().unwrap_or(0)
    }

    /// Every firing in order.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }
}
