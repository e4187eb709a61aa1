//! Event types crossing the engine boundary.
//!
//! Incoming push events arrive as [`RawEvent`]s, already decoded by the
//! transport glue. Outgoing notifications leave as [`Update`]s through the
//! [`crate::Dispatcher`]. Event content is opaque to the engine; only the
//! ordering counters and scope references are interpreted here.

use crate::{Revision, ScopeId, Seq, Timestamp};
use serde::{Deserialize, Serialize};

/// An entity (user, chat, ...) referenced by delivered events.
///
/// Entities ride along with envelopes and difference pages so that lookups
/// by id succeed without a separate fetch. Their bodies are opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique entity id.
    pub id: String,
    /// Opaque entity body, merged into the application cache on hydration.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Entity {
    /// Create an entity with the given id and body.
    pub fn new(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// A multi-event envelope spanning a range of the global sequence.
///
/// `seq_start == Some(0)` (or `seq == 0` with no explicit start) marks a
/// sequence-less envelope that is applied unconditionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    /// First sequence number covered by this envelope, when it differs from
    /// `seq`. Absent for single-step envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_start: Option<Seq>,
    /// Last sequence number covered by this envelope. Zero when the
    /// envelope does not participate in sequence ordering.
    pub seq: Seq,
    /// Server timestamp of the envelope.
    pub date: Timestamp,
    /// New auxiliary cursor value, when the envelope carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<u64>,
    /// Events bundled in this envelope, re-classified one by one on apply.
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Entities referenced by the bundled events.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl EventBatch {
    /// Create an envelope covering a single sequence step.
    pub fn new(seq: Seq, date: Timestamp, events: Vec<RawEvent>) -> Self {
        Self {
            seq_start: None,
            seq,
            date,
            aux: None,
            events,
            entities: Vec::new(),
        }
    }

    /// Set an explicit start of the covered sequence range.
    pub fn with_seq_start(mut self, seq_start: Seq) -> Self {
        self.seq_start = Some(seq_start);
        self
    }

    /// Attach referenced entities.
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach a new auxiliary cursor value.
    pub fn with_aux(mut self, aux: u64) -> Self {
        self.aux = Some(aux);
        self
    }
}

/// A single event consuming revision units on one conversation scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionedEvent {
    /// Explicit scope reference; `None` routes to the common stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    /// Revision the scope reaches once this event applies.
    pub revision: Revision,
    /// Revision units this event consumes (normally 1, sometimes batched).
    pub revision_count: u64,
    /// Opaque event content, dispatched on apply.
    pub payload: serde_json::Value,
    /// Entity context attached by an enclosing envelope or difference page.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl RevisionedEvent {
    /// Create a revisioned event.
    pub fn new(
        scope: Option<ScopeId>,
        revision: Revision,
        revision_count: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            scope,
            revision,
            revision_count,
            payload,
            entities: Vec::new(),
        }
    }
}

/// Server-side overflow marker: the scope's backlog grew past what deltas
/// can replay, so it must be recovered through a difference fetch at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeTooLong {
    /// The overflowed scope.
    pub scope: ScopeId,
}

/// Revision units consumed by a local RPC side effect (e.g. a bulk-action
/// acknowledgement). Advances the scope cursor without dispatching anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionAck {
    /// Explicit scope reference; `None` routes to the common stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    /// Revision the scope reaches once this ack applies.
    pub revision: Revision,
    /// Revision units consumed.
    pub revision_count: u64,
}

impl RevisionAck {
    /// Create a revision acknowledgement.
    pub fn new(scope: Option<ScopeId>, revision: Revision, revision_count: u64) -> Self {
        Self {
            scope,
            revision,
            revision_count,
        }
    }
}

/// An event with no ordering counters, applied as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainEvent {
    /// Opaque event content, dispatched on apply.
    pub payload: serde_json::Value,
    /// Entity context attached by an enclosing envelope or difference page.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl PlainEvent {
    /// Create a plain event.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            entities: Vec::new(),
        }
    }
}

/// A push event as delivered by the transport, before ordering checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RawEvent {
    /// Multi-event envelope on the global sequence.
    Batch(EventBatch),
    /// Revision delta on one conversation scope.
    Revisioned(RevisionedEvent),
    /// Scope can no longer be caught up by deltas; recover immediately.
    ScopeTooLong(ScopeTooLong),
    /// Local revision acknowledgement, no payload.
    Ack(RevisionAck),
    /// Counter-less event, dispatched without ordering checks.
    Plain(PlainEvent),
}

impl RawEvent {
    /// The scope this event belongs to, falling back to the common sentinel
    /// when it carries no explicit scope reference.
    pub fn scope_hint(&self) -> ScopeId {
        match self {
            RawEvent::Revisioned(event) => {
                event.scope.clone().unwrap_or_else(ScopeId::common)
            }
            RawEvent::Ack(ack) => ack.scope.clone().unwrap_or_else(ScopeId::common),
            RawEvent::ScopeTooLong(marker) => marker.scope.clone(),
            RawEvent::Batch(_) | RawEvent::Plain(_) => ScopeId::common(),
        }
    }

    /// Attach entity context from an enclosing envelope, so the dispatched
    /// event resolves its references without a separate fetch.
    pub(crate) fn attach_entities(&mut self, entities: &[Entity]) {
        if entities.is_empty() {
            return;
        }
        match self {
            RawEvent::Revisioned(event) => event.entities = entities.to_vec(),
            RawEvent::Plain(event) => event.entities = entities.to_vec(),
            RawEvent::Batch(_) | RawEvent::ScopeTooLong(_) | RawEvent::Ack(_) => {}
        }
    }
}

/// An event that cleared every ordering check, as handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedEvent {
    /// Opaque event content.
    pub payload: serde_json::Value,
    /// Entity context for dependent lookups.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl AppliedEvent {
    /// Create an applied event without entity context.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            entities: Vec::new(),
        }
    }
}

/// Progress signal for the global difference fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchingDifference {
    /// `true` when a fetch starts, `false` once it settles.
    pub active: bool,
}

/// Notification handed to the application through [`crate::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Update {
    /// An ordered event that is now safe to apply to application state.
    Event(AppliedEvent),
    /// The global difference fetch started or settled.
    FetchingDifference(FetchingDifference),
    /// Local reconciliation state was discarded; the application must
    /// rebuild its caches from scratch.
    RequestResync,
}
