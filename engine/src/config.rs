//! Engine configuration.

use std::time::Duration;

/// Quiet period between a gap signal and the difference fetch it triggers.
const RECOVERY_DEBOUNCE: Duration = Duration::from_millis(500);

/// Page size requested from the per-scope difference call.
const SCOPE_FETCH_LIMIT: u32 = 1000;

/// Tuning knobs for the update manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How long a detected gap must stay open before recovery fires.
    /// Repeated gap signals within the window coalesce into one fetch.
    pub recovery_debounce: Duration,
    /// Maximum number of events requested per scope-difference page.
    pub scope_fetch_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recovery_debounce: RECOVERY_DEBOUNCE,
            scope_fetch_limit: SCOPE_FETCH_LIMIT,
        }
    }
}
