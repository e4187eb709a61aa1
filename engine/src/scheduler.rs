//! Debounced recovery timers.
//!
//! One cancellable delayed task per stream: a single slot for the global
//! stream plus one per scope. Arming an already-armed stream is a no-op,
//! which coalesces repeated gap signals into a single fetch. The entry is
//! removed when the timer fires, before the recovery body runs, so a gap
//! detected during the fetch can arm a fresh timer.

use crate::ScopeId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Key of one recovery stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum StreamKey {
    /// The global sequence stream.
    Global,
    /// One conversation scope's revision stream.
    Scope(ScopeId),
}

type TimerMap = HashMap<StreamKey, JoinHandle<()>>;

/// Table of pending recovery timers, keyed by stream.
#[derive(Debug, Default)]
pub(crate) struct RecoveryTimers {
    entries: Arc<Mutex<TimerMap>>,
}

impl RecoveryTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `key` unless one is already pending.
    ///
    /// Returns `false` when the stream already has a timer (or an armed
    /// fetch that has not started yet); the pending one will cover this gap
    /// signal too. Must be called within a tokio runtime.
    pub fn arm<F>(&self, key: StreamKey, delay: Duration, fire: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut entries = self.entries.lock().expect("timer table lock poisoned");
        if entries.contains_key(&key) {
            return false;
        }

        let registry = Arc::clone(&self.entries);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Free the slot before fetching, so a gap found mid-fetch can
            // arm again. Cancellations from here on no longer abort us.
            registry
                .lock()
                .expect("timer table lock poisoned")
                .remove(&task_key);
            fire.await;
        });

        entries.insert(key, handle);
        true
    }

    /// Cancel the pending timer for `key`, if any. A timer that already
    /// fired has removed its own entry and keeps running.
    pub fn cancel(&self, key: &StreamKey) {
        let handle = self
            .entries
            .lock()
            .expect("timer table lock poisoned")
            .remove(key);
        if let Some(handle) = handle {
            handle.abort();
            tracing::trace!(stream = ?key, "recovery timer cancelled");
        }
    }

    /// Cancel every pending timer. Used by full resync.
    pub fn cancel_all(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut entries = self.entries.lock().expect("timer table lock poisoned");
            entries.drain().map(|(_, handle)| handle).collect()
        };
        let cancelled = handles.len();
        for handle in handles {
            handle.abort();
        }
        if cancelled > 0 {
            tracing::debug!(cancelled, "all recovery timers cancelled");
        }
    }

    /// Whether a timer is pending for `key`.
    pub fn is_armed(&self, key: &StreamKey) -> bool {
        self.entries
            .lock()
            .expect("timer table lock poisoned")
            .contains_key(key)
    }
}
