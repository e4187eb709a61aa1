//! Local reconciliation state: cursors, scope revisions, diagnostics.
//!
//! This is the single-writer state the trackers mutate on every successful
//! drain step. It is owned by the update manager and handed to the tracker
//! functions by reference, so tests can construct isolated instances.

use crate::{Revision, ScopeId, Seq, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The global cursor: where the local mirror stands in the server's stream.
///
/// Adopted wholesale from the "get current state" call and from difference
/// results; advanced field by field as envelopes apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    /// Last applied global sequence number.
    pub seq: Seq,
    /// Server timestamp of the last applied envelope.
    pub date: Timestamp,
    /// Last applied revision of the common stream.
    pub revision: Revision,
    /// Auxiliary cursor for the secondary event feed.
    pub aux: u64,
}

/// Counters for events the engine dropped on purpose.
///
/// Dropping is correct steady-state behavior, but persistent growth of
/// `dropped_unknown_scope` can point at a scope desync upstream, so the
/// counts are surfaced instead of discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Events at or below the local cursor, dropped as duplicates.
    pub dropped_stale: u64,
    /// Events for scopes with no local revision entry.
    pub dropped_unknown_scope: u64,
    /// Events submitted before the first baseline fetch completed.
    pub dropped_before_baseline: u64,
}

/// Cursor and revision bookkeeping for both revision streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    /// Global cursor; `None` until the first baseline fetch completes.
    cursor: Option<CursorState>,
    /// Last applied revision per conversation scope. The common stream's
    /// revision lives on the cursor, not in this map.
    scope_revisions: HashMap<ScopeId, Revision>,
    /// Bumped on every full resync. In-flight recovery fetches compare it
    /// before applying their result, so late completions cannot resurrect
    /// stale cursors.
    generation: u64,
    /// Drop diagnostics.
    stats: EngineStats,
}

impl TrackerState {
    /// Create uninitialized state: no cursor, no known scopes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline cursor has been adopted.
    pub fn is_ready(&self) -> bool {
        self.cursor.is_some()
    }

    /// The current global cursor.
    pub fn cursor(&self) -> Option<&CursorState> {
        self.cursor.as_ref()
    }

    /// Mutable access to the adopted cursor.
    pub fn cursor_mut(&mut self) -> Option<&mut CursorState> {
        self.cursor.as_mut()
    }

    /// Adopt an authoritative cursor wholesale.
    pub fn adopt_cursor(&mut self, cursor: CursorState) {
        self.cursor = Some(cursor);
    }

    /// Advance only the sequence half of the cursor.
    pub fn adopt_seq(&mut self, seq: u64, date: Timestamp) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.seq = seq;
            cursor.date = date;
        }
    }

    /// Last applied revision for a scope, with the common sentinel resolved
    /// against the cursor. `None` means the scope is not tracked locally.
    pub fn revision_of(&self, scope: &ScopeId) -> Option<Revision> {
        if scope.is_common() {
            self.cursor.as_ref().map(|cursor| cursor.revision)
        } else {
            self.scope_revisions.get(scope).copied()
        }
    }

    /// Record a scope's new last-applied revision.
    pub fn set_revision(&mut self, scope: &ScopeId, revision: Revision) {
        if scope.is_common() {
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.revision = revision;
            }
        } else {
            self.scope_revisions.insert(scope.clone(), revision);
        }
    }

    /// Raw map lookup, common sentinel excluded. Used where "scope entry
    /// exists" and "cursor exists" must stay distinct: scope recovery
    /// preconditions and revision observation.
    pub fn scope_entry(&self, scope: &ScopeId) -> Option<Revision> {
        self.scope_revisions.get(scope).copied()
    }

    /// Insert or overwrite a scope's map entry directly.
    pub fn set_scope_entry(&mut self, scope: ScopeId, revision: Revision) {
        self.scope_revisions.insert(scope, revision);
    }

    /// Resync generation this state belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop diagnostics.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut EngineStats {
        &mut self.stats
    }

    /// Wipe reconciliation state for a full resync.
    ///
    /// The cursor goes back to uninitialized and every scope revision is
    /// reset to zero in place: the scopes stay known, their history does
    /// not. Diagnostics survive, the generation moves on.
    pub fn reset(&mut self) {
        self.cursor = None;
        for revision in self.scope_revisions.values_mut() {
            *revision = 0;
        }
        self.generation += 1;
    }
}
