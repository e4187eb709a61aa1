//! Drain state machines for the two revision streams.
//!
//! The tracker owns the ordered buffers and the local cursors, and decides
//! for every envelope whether it applies, waits, or gets dropped. It does
//! no I/O: side effects (dispatching, scheduling recovery) are emitted as
//! [`Action`]s for the update manager to execute, which keeps the decision
//! tables deterministic and testable in isolation.

use crate::envelope::{scope_order, seq_order, ScopeEnvelope, SeqEnvelope};
use crate::event::{AppliedEvent, RawEvent, Update};
use crate::queue::SortedQueue;
use crate::state::TrackerState;
use crate::{Revision, ScopeId};
use std::collections::HashMap;

/// A side effect requested by a drain step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    /// Hand a notification to the application sink.
    Dispatch(Update),
    /// Arm the debounced global recovery timer.
    ScheduleGlobal,
    /// Arm the debounced recovery timer for one scope.
    ScheduleScope(ScopeId),
    /// Start a scope recovery fetch immediately, bypassing the debounce.
    RecoverScopeNow(ScopeId),
    /// Cancel the pending global recovery timer: the gap closed on its own.
    ClearGlobalTimer,
    /// Cancel a scope's pending recovery timer.
    ClearScopeTimer(ScopeId),
}

/// How an event enters the tracker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Submit {
    /// Replayed from a difference result; ordering checks relax.
    pub from_recovery: bool,
    /// Buffer without draining. Used while a difference page defers events
    /// for scopes that are mid-recovery themselves.
    pub save_only: bool,
}

impl Submit {
    /// A live event straight off the transport.
    pub fn live() -> Self {
        Self {
            from_recovery: false,
            save_only: false,
        }
    }

    /// An event replayed out of a difference result.
    pub fn recovered() -> Self {
        Self {
            from_recovery: true,
            save_only: false,
        }
    }

    /// Buffer only; the scope drains once its own recovery resolves.
    pub fn deferred() -> Self {
        Self {
            from_recovery: false,
            save_only: true,
        }
    }
}

/// Buffers and cursors for both revision streams.
pub(crate) struct Tracker {
    state: TrackerState,
    seq_queue: SortedQueue<SeqEnvelope>,
    scope_queues: HashMap<ScopeId, SortedQueue<ScopeEnvelope>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::new(),
            seq_queue: SortedQueue::new(seq_order),
            scope_queues: HashMap::new(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TrackerState {
        &mut self.state
    }

    /// Classify an incoming event and route it to its stream.
    ///
    /// Events arriving before the baseline cursor exists are dropped: a
    /// reconnecting transport can push bursts before initialization
    /// finishes, and nothing before the baseline can be ordered anyway.
    pub fn submit(&mut self, event: RawEvent, mode: Submit, actions: &mut Vec<Action>) {
        if !self.state.is_ready() {
            self.state.stats_mut().dropped_before_baseline += 1;
            return;
        }

        match event {
            RawEvent::Batch(batch) => {
                let envelope = SeqEnvelope {
                    batch,
                    from_recovery: mode.from_recovery,
                };
                self.seq_queue.add(envelope);
                if !mode.save_only {
                    self.pop_global(actions);
                }
            }
            RawEvent::Revisioned(event) => {
                let scope = event.scope.clone().unwrap_or_else(ScopeId::common);
                let envelope = ScopeEnvelope {
                    scope: scope.clone(),
                    revision: event.revision,
                    revision_count: event.revision_count,
                    body: Some(AppliedEvent {
                        payload: event.payload,
                        entities: event.entities,
                    }),
                    from_recovery: mode.from_recovery,
                };
                self.enqueue_scope(scope, envelope, mode, actions);
            }
            RawEvent::Ack(ack) => {
                let scope = ack.scope.clone().unwrap_or_else(ScopeId::common);
                let envelope = ScopeEnvelope {
                    scope: scope.clone(),
                    revision: ack.revision,
                    revision_count: ack.revision_count,
                    body: None,
                    from_recovery: mode.from_recovery,
                };
                self.enqueue_scope(scope, envelope, mode, actions);
            }
            RawEvent::ScopeTooLong(marker) => {
                // Deltas cannot catch this scope up; skip the queue and the
                // debounce entirely.
                actions.push(Action::RecoverScopeNow(marker.scope));
            }
            RawEvent::Plain(event) => {
                actions.push(Action::Dispatch(Update::Event(AppliedEvent {
                    payload: event.payload,
                    entities: event.entities,
                })));
            }
        }
    }

    fn enqueue_scope(
        &mut self,
        scope: ScopeId,
        envelope: ScopeEnvelope,
        mode: Submit,
        actions: &mut Vec<Action>,
    ) {
        self.scope_queues
            .entry(scope.clone())
            .or_insert_with(|| SortedQueue::new(scope_order))
            .add(envelope);
        if !mode.save_only {
            self.pop_scope(&scope, actions);
        }
    }

    /// Drain the global sequence buffer as far as it goes.
    pub fn pop_global(&mut self, actions: &mut Vec<Action>) {
        while let Some(envelope) = self.seq_queue.pop() {
            let Some(local_seq) = self.state.cursor().map(|cursor| cursor.seq) else {
                return;
            };
            let start = envelope.start_seq();

            if start == 0 || (envelope.from_recovery && start >= local_seq + 1) {
                // Sequence-less envelopes and replayed events at or past the
                // adopted baseline apply without strict ordering.
                self.apply_seq(envelope, actions);
            } else if start == local_seq + 1 {
                actions.push(Action::ClearGlobalTimer);
                self.apply_seq(envelope, actions);
            } else if start > local_seq + 1 {
                // Gap: put the envelope back and stop, otherwise this loop
                // would pop and requeue it forever.
                self.seq_queue.add(envelope);
                actions.push(Action::ScheduleGlobal);
                return;
            } else {
                self.state.stats_mut().dropped_stale += 1;
            }
        }
    }

    fn apply_seq(&mut self, envelope: SeqEnvelope, actions: &mut Vec<Action>) {
        let SeqEnvelope {
            batch,
            from_recovery: _,
        } = envelope;

        if batch.seq != 0 {
            self.state.adopt_seq(batch.seq, batch.date);
        }
        if let Some(aux) = batch.aux {
            if let Some(cursor) = self.state.cursor_mut() {
                cursor.aux = aux;
            }
        }

        // Embedded events re-enter classification one by one, carrying the
        // envelope's entity set so dependent lookups resolve.
        let entities = batch.entities;
        for mut event in batch.events {
            event.attach_entities(&entities);
            self.submit(event, Submit::live(), actions);
        }
    }

    /// Drain one scope's revision buffer as far as it goes.
    pub fn pop_scope(&mut self, scope: &ScopeId, actions: &mut Vec<Action>) {
        loop {
            let Some(envelope) = self
                .scope_queues
                .get_mut(scope)
                .and_then(|queue| queue.pop())
            else {
                return;
            };

            let Some(local_revision) = self.state.revision_of(scope) else {
                // The server pushes for scopes opened in other clients;
                // with no local entry there is nothing to anchor them to.
                self.state.stats_mut().dropped_unknown_scope += 1;
                return;
            };
            let expected = local_revision + envelope.revision_count;

            if envelope.from_recovery && envelope.revision >= expected {
                self.apply_scope(envelope, actions);
            } else if envelope.revision == expected {
                actions.push(Action::ClearScopeTimer(scope.clone()));
                self.apply_scope(envelope, actions);
            } else if envelope.revision > expected {
                // Gap: requeue and stop, same termination argument as the
                // global drain. The common stream recovers through the
                // global difference, every other scope through its own.
                if let Some(queue) = self.scope_queues.get_mut(scope) {
                    queue.add(envelope);
                }
                if scope.is_common() {
                    actions.push(Action::ScheduleGlobal);
                } else {
                    actions.push(Action::ScheduleScope(scope.clone()));
                }
                return;
            } else {
                self.state.stats_mut().dropped_stale += 1;
            }
        }
    }

    fn apply_scope(&mut self, envelope: ScopeEnvelope, actions: &mut Vec<Action>) {
        self.state.set_revision(&envelope.scope, envelope.revision);
        if let Some(body) = envelope.body {
            actions.push(Action::Dispatch(Update::Event(body)));
        }
    }

    /// Seed or refresh a scope's revision from outside the event stream,
    /// e.g. when the application loads a conversation.
    ///
    /// A tracked scope that turns out to be behind the observed revision is
    /// scheduled for recovery instead of jumping, so the missed span still
    /// replays.
    pub fn observe_scope(&mut self, scope: &ScopeId, revision: Revision, actions: &mut Vec<Action>) {
        match self.state.scope_entry(scope) {
            Some(current) if current != 0 && current < revision => {
                actions.push(Action::ScheduleScope(scope.clone()));
            }
            _ => self.state.set_scope_entry(scope.clone(), revision),
        }
    }

    /// Drop every buffered envelope on every stream.
    pub fn clear_buffers(&mut self) {
        self.seq_queue.clear();
        self.scope_queues.clear();
    }

    #[cfg(test)]
    pub fn seq_queue_len(&self) -> usize {
        self.seq_queue.len()
    }

    #[cfg(test)]
    pub fn scope_queue_len(&self, scope: &ScopeId) -> usize {
        self.scope_queues
            .get(scope)
            .map(SortedQueue::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Entity, EventBatch, PlainEvent, RevisionAck, RevisionedEvent, ScopeTooLong};
    use crate::state::CursorState;
    use serde_json::json;

    fn ready_tracker() -> Tracker {
        let mut tracker = Tracker::new();
        tracker.state_mut().adopt_cursor(CursorState {
            seq: 5,
            date: 1000,
            revision: 100,
            aux: 40,
        });
        tracker
    }

    fn batch(seq_start: u64, payload: serde_json::Value) -> RawEvent {
        RawEvent::Batch(
            EventBatch::new(seq_start, 1000 + seq_start, vec![RawEvent::Plain(
                PlainEvent::new(payload),
            )])
            .with_seq_start(seq_start),
        )
    }

    fn revisioned(scope: &str, revision: u64, count: u64) -> RawEvent {
        RawEvent::Revisioned(RevisionedEvent::new(
            Some(ScopeId::new(scope)),
            revision,
            count,
            json!({"revision": revision}),
        ))
    }

    fn dispatched(actions: &[Action]) -> Vec<serde_json::Value> {
        actions
            .iter()
            .filter_map(|action| match action {
                Action::Dispatch(Update::Event(event)) => Some(event.payload.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn in_order_batch_advances_cursor() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        tracker.submit(batch(6, json!({"n": 6})), Submit::live(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().seq, 6);
        assert_eq!(dispatched(&actions), vec![json!({"n": 6})]);
        assert!(actions.contains(&Action::ClearGlobalTimer));
        assert!(!actions.contains(&Action::ScheduleGlobal));
    }

    #[test]
    fn gap_requeues_and_schedules_once() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        tracker.submit(batch(8, json!({"n": 8})), Submit::live(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().seq, 5);
        assert_eq!(dispatched(&actions), Vec::<serde_json::Value>::new());
        assert_eq!(actions, vec![Action::ScheduleGlobal]);
        assert_eq!(tracker.seq_queue_len(), 1);

        // Draining again terminates instead of spinning on the same gap.
        let mut again = Vec::new();
        tracker.pop_global(&mut again);
        assert_eq!(again, vec![Action::ScheduleGlobal]);
        assert_eq!(tracker.seq_queue_len(), 1);
    }

    #[test]
    fn out_of_order_arrivals_drain_in_order() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        tracker.submit(batch(7, json!({"n": 7})), Submit::live(), &mut actions);
        tracker.submit(batch(6, json!({"n": 6})), Submit::live(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().seq, 7);
        assert_eq!(dispatched(&actions), vec![json!({"n": 6}), json!({"n": 7})]);
    }

    #[test]
    fn stale_batch_is_dropped_silently() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        tracker.submit(batch(5, json!({"n": 5})), Submit::live(), &mut actions);
        tracker.submit(batch(4, json!({"n": 4})), Submit::live(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().seq, 5);
        assert!(dispatched(&actions).is_empty());
        assert_eq!(tracker.state().stats().dropped_stale, 2);
    }

    #[test]
    fn resubmitting_applied_batch_does_not_redispatch() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();
        tracker.submit(batch(6, json!({"n": 6})), Submit::live(), &mut actions);

        let mut replay = Vec::new();
        tracker.submit(batch(6, json!({"n": 6})), Submit::live(), &mut replay);

        assert_eq!(tracker.state().cursor().unwrap().seq, 6);
        assert!(dispatched(&replay).is_empty());
        assert_eq!(tracker.state().stats().dropped_stale, 1);
    }

    #[test]
    fn sequence_less_batch_applies_unconditionally() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        let event = RawEvent::Batch(EventBatch::new(0, 0, vec![RawEvent::Plain(
            PlainEvent::new(json!({"kind": "serviceNotice"})),
        )]));
        tracker.submit(event, Submit::live(), &mut actions);

        // Applied, but a zero sequence never moves the cursor.
        assert_eq!(tracker.state().cursor().unwrap().seq, 5);
        assert_eq!(dispatched(&actions), vec![json!({"kind": "serviceNotice"})]);
    }

    #[test]
    fn recovered_batch_past_baseline_applies_relaxed() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        tracker.submit(batch(9, json!({"n": 9})), Submit::recovered(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().seq, 9);
        assert_eq!(dispatched(&actions), vec![json!({"n": 9})]);
    }

    #[test]
    fn events_before_baseline_are_dropped() {
        let mut tracker = Tracker::new();
        let mut actions = Vec::new();

        tracker.submit(batch(6, json!({})), Submit::live(), &mut actions);

        assert!(actions.is_empty());
        assert_eq!(tracker.state().stats().dropped_before_baseline, 1);
        assert_eq!(tracker.seq_queue_len(), 0);
    }

    #[test]
    fn batch_attaches_entities_to_embedded_events() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        let entities = vec![Entity::new("user-1", json!({"name": "Alice"}))];
        let event = RawEvent::Batch(
            EventBatch::new(6, 1006, vec![RawEvent::Plain(PlainEvent::new(
                json!({"kind": "newMessage"}),
            ))])
            .with_seq_start(6)
            .with_entities(entities.clone()),
        );
        tracker.submit(event, Submit::live(), &mut actions);

        match &actions[..] {
            [Action::ClearGlobalTimer, Action::Dispatch(Update::Event(applied))] => {
                assert_eq!(applied.entities, entities);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn batch_routes_embedded_revision_delta_to_scope_stream() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        let event = RawEvent::Batch(
            EventBatch::new(6, 1006, vec![revisioned("42", 11, 1)]).with_seq_start(6),
        );
        tracker.submit(event, Submit::live(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().seq, 6);
        assert_eq!(
            tracker.state().revision_of(&ScopeId::new("42")),
            Some(11)
        );
        assert_eq!(dispatched(&actions), vec![json!({"revision": 11})]);
    }

    #[test]
    fn batch_aux_cursor_is_adopted() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        let event = RawEvent::Batch(
            EventBatch::new(6, 1006, Vec::new())
                .with_seq_start(6)
                .with_aux(41),
        );
        tracker.submit(event, Submit::live(), &mut actions);

        assert_eq!(tracker.state().cursor().unwrap().aux, 41);
    }

    #[test]
    fn scope_in_order_applies_and_clears_timer() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        tracker.submit(revisioned("42", 11, 1), Submit::live(), &mut actions);

        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(11));
        assert!(actions.contains(&Action::ClearScopeTimer(ScopeId::new("42"))));
    }

    #[test]
    fn scope_gap_schedules_scope_recovery() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        tracker.submit(revisioned("42", 13, 1), Submit::live(), &mut actions);

        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(10));
        assert_eq!(actions, vec![Action::ScheduleScope(ScopeId::new("42"))]);
        assert_eq!(tracker.scope_queue_len(&ScopeId::new("42")), 1);
    }

    #[test]
    fn common_scope_gap_schedules_global_recovery() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        // Common stream sits at revision 100; 103 leaves a hole.
        let event = RawEvent::Revisioned(RevisionedEvent::new(
            None,
            103,
            1,
            json!({}),
        ));
        tracker.submit(event, Submit::live(), &mut actions);

        assert_eq!(actions, vec![Action::ScheduleGlobal]);
        assert_eq!(tracker.state().cursor().unwrap().revision, 100);
    }

    #[test]
    fn revision_count_arithmetic_batches_units() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        // Consumes revisions 11 and 12 in one event.
        tracker.submit(revisioned("42", 12, 2), Submit::live(), &mut actions);

        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(12));
        assert_eq!(dispatched(&actions), vec![json!({"revision": 12})]);
    }

    #[test]
    fn unknown_scope_drops_without_recovery() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        tracker.submit(revisioned("99", 7, 1), Submit::live(), &mut actions);

        assert!(actions.is_empty());
        assert_eq!(tracker.state().stats().dropped_unknown_scope, 1);
        assert_eq!(tracker.state().revision_of(&ScopeId::new("99")), None);
    }

    #[test]
    fn ack_advances_revision_without_dispatch() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        let ack = RawEvent::Ack(RevisionAck::new(Some(ScopeId::new("42")), 11, 1));
        tracker.submit(ack, Submit::live(), &mut actions);

        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(11));
        assert!(dispatched(&actions).is_empty());
    }

    #[test]
    fn too_long_marker_requests_immediate_recovery() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();

        let event = RawEvent::ScopeTooLong(ScopeTooLong {
            scope: ScopeId::new("42"),
        });
        tracker.submit(event, Submit::live(), &mut actions);

        assert_eq!(actions, vec![Action::RecoverScopeNow(ScopeId::new("42"))]);
        assert_eq!(tracker.scope_queue_len(&ScopeId::new("42")), 0);
    }

    #[test]
    fn save_only_buffers_without_draining() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        tracker.submit(revisioned("42", 11, 1), Submit::deferred(), &mut actions);

        assert!(actions.is_empty());
        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(10));
        assert_eq!(tracker.scope_queue_len(&ScopeId::new("42")), 1);

        // Resuming the scope drain picks the buffered event up.
        tracker.pop_scope(&ScopeId::new("42"), &mut actions);
        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(11));
        assert_eq!(dispatched(&actions), vec![json!({"revision": 11})]);
    }

    #[test]
    fn equal_revision_larger_count_applies_first() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();

        // Same target revision 12, consuming 2 and 1 units. Buffered while
        // the gap at 11 is open, then drained together.
        tracker.submit(revisioned("42", 12, 1), Submit::deferred(), &mut actions);
        tracker.submit(revisioned("42", 12, 2), Submit::deferred(), &mut actions);
        tracker.pop_scope(&ScopeId::new("42"), &mut actions);

        // The two-unit event matches 10 + 2 and applies; the one-unit
        // sibling is then stale at revision 12.
        assert_eq!(tracker.state().revision_of(&ScopeId::new("42")), Some(12));
        assert_eq!(dispatched(&actions), vec![json!({"revision": 12})]);
        assert_eq!(tracker.state().stats().dropped_stale, 1);
    }

    #[test]
    fn observe_scope_seeds_and_schedules() {
        let mut tracker = ready_tracker();
        let mut actions = Vec::new();
        let scope = ScopeId::new("42");

        // Unknown scope: seed directly.
        tracker.observe_scope(&scope, 10, &mut actions);
        assert_eq!(tracker.state().scope_entry(&scope), Some(10));
        assert!(actions.is_empty());

        // Already tracked and behind: recover instead of jumping.
        tracker.observe_scope(&scope, 15, &mut actions);
        assert_eq!(tracker.state().scope_entry(&scope), Some(10));
        assert_eq!(actions, vec![Action::ScheduleScope(scope.clone())]);

        // Zeroed after a resync: seed again.
        tracker.state_mut().set_scope_entry(scope.clone(), 0);
        actions.clear();
        tracker.observe_scope(&scope, 20, &mut actions);
        assert_eq!(tracker.state().scope_entry(&scope), Some(20));
        assert!(actions.is_empty());
    }

    #[test]
    fn clear_buffers_empties_both_streams() {
        let mut tracker = ready_tracker();
        tracker.state_mut().set_revision(&ScopeId::new("42"), 10);
        let mut actions = Vec::new();
        tracker.submit(batch(9, json!({})), Submit::live(), &mut actions);
        tracker.submit(revisioned("42", 13, 1), Submit::live(), &mut actions);

        tracker.clear_buffers();

        assert_eq!(tracker.seq_queue_len(), 0);
        assert_eq!(tracker.scope_queue_len(&ScopeId::new("42")), 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any arrival order of a contiguous run applies every envelope
            /// exactly once, in order, and lands the cursor at the end.
            #[test]
            fn contiguous_run_applies_gapless(order in Just((6u64..=15).collect::<Vec<_>>()).prop_shuffle()) {
                let mut tracker = ready_tracker();
                let mut actions = Vec::new();

                for seq in order {
                    tracker.submit(batch(seq, json!({"seq": seq})), Submit::live(), &mut actions);
                }

                prop_assert_eq!(tracker.state().cursor().unwrap().seq, 15);
                prop_assert_eq!(tracker.seq_queue_len(), 0);

                let applied = dispatched(&actions);
                let expected: Vec<_> = (6u64..=15).map(|seq| json!({"seq": seq})).collect();
                prop_assert_eq!(applied, expected);
            }

            /// Same property for one scope's revision stream.
            #[test]
            fn scope_run_applies_gapless(order in Just((11u64..=20).collect::<Vec<_>>()).prop_shuffle()) {
                let mut tracker = ready_tracker();
                let scope = ScopeId::new("42");
                tracker.state_mut().set_revision(&scope, 10);
                let mut actions = Vec::new();

                for revision in order {
                    tracker.submit(revisioned("42", revision, 1), Submit::live(), &mut actions);
                }

                prop_assert_eq!(tracker.state().revision_of(&scope), Some(20));
                prop_assert_eq!(tracker.scope_queue_len(&scope), 0);

                let applied = dispatched(&actions);
                let expected: Vec<_> = (11u64..=20).map(|revision| json!({"revision": revision})).collect();
                prop_assert_eq!(applied, expected);
            }

            /// Replaying an already-applied prefix never moves the cursor or
            /// dispatches again.
            #[test]
            fn replays_are_idempotent(replay in prop::collection::vec(6u64..=10, 1..20)) {
                let mut tracker = ready_tracker();
                let mut actions = Vec::new();
                for seq in 6u64..=10 {
                    tracker.submit(batch(seq, json!({"seq": seq})), Submit::live(), &mut actions);
                }
                let applied_before = dispatched(&actions).len();

                let mut noise = Vec::new();
                for seq in replay {
                    tracker.submit(batch(seq, json!({"seq": seq})), Submit::live(), &mut noise);
                }

                prop_assert_eq!(tracker.state().cursor().unwrap().seq, 10);
                prop_assert_eq!(dispatched(&noise).len(), 0);
                prop_assert_eq!(applied_before, 5);
            }
        }
    }
}
