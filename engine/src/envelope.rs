//! Buffered envelopes and their drain orderings.
//!
//! Submitted events are wrapped into envelopes before entering an ordered
//! buffer: sequence envelopes keyed by their start sequence, scope
//! envelopes keyed by revision.

use crate::event::{AppliedEvent, EventBatch};
use crate::{Revision, ScopeId, Seq};
use std::cmp::Ordering;

/// A sequence-stream envelope waiting in the global buffer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SeqEnvelope {
    /// The multi-event batch as delivered.
    pub batch: EventBatch,
    /// Replayed from a difference result; ordering checks relax.
    pub from_recovery: bool,
}

impl SeqEnvelope {
    /// The sequence number this envelope is ordered by: the explicit range
    /// start when present, the envelope's own sequence otherwise.
    pub fn start_seq(&self) -> Seq {
        self.batch.seq_start.unwrap_or(self.batch.seq)
    }
}

/// Drain order of the global buffer: ascending start sequence.
pub(crate) fn seq_order(a: &SeqEnvelope, b: &SeqEnvelope) -> Ordering {
    a.start_seq().cmp(&b.start_seq())
}

/// A revision-stream envelope waiting in a scope buffer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScopeEnvelope {
    /// The scope whose buffer holds this envelope.
    pub scope: ScopeId,
    /// Revision the scope reaches once this envelope applies.
    pub revision: Revision,
    /// Revision units consumed.
    pub revision_count: u64,
    /// Event content to dispatch on apply; `None` for acknowledgements.
    pub body: Option<AppliedEvent>,
    /// Replayed from a difference result; ordering checks relax.
    pub from_recovery: bool,
}

/// Drain order of a scope buffer: ascending revision; equal revisions drain
/// the envelope consuming more revision units first.
///
/// The descending tie-break is inherited behavior with no verified
/// rationale; `tracker` tests pin it so a change shows up loudly.
pub(crate) fn scope_order(a: &ScopeEnvelope, b: &ScopeEnvelope) -> Ordering {
    a.revision
        .cmp(&b.revision)
        .then(b.revision_count.cmp(&a.revision_count))
}
