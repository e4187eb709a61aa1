//! Difference fetches: closing gaps against the authoritative catalog.
//!
//! Two entry points, one per stream kind. Both snapshot the state
//! generation before going to the network and re-check it before touching
//! state again, so a fetch that resolves after a full resync cannot
//! resurrect stale cursors. Events replayed out of a difference re-enter
//! the normal classification path flagged `from_recovery`, which is what
//! keeps them from re-arming recovery for gaps the fetch itself closed.

use crate::error::{Error, Result};
use crate::event::{AppliedEvent, FetchingDifference, RawEvent, Update};
use crate::gateway::{
    Difference, DifferenceArgs, Directory, Dispatcher, Gateway, ScopeDifference,
    ScopeDifferenceArgs,
};
use crate::manager::Inner;
use crate::tracker::{Action, Submit, Tracker};
use crate::ScopeId;
use std::collections::HashSet;
use std::sync::Arc;

impl<G, D, Y> Inner<G, D, Y>
where
    G: Gateway,
    D: Dispatcher,
    Y: Directory,
{
    /// Fetch the baseline cursor and adopt it, unless a resync superseded
    /// the caller's view of the state in the meantime.
    pub(crate) async fn load_baseline(inner: &Arc<Self>, expected_generation: u64) -> Result<()> {
        let Some(state) = inner.gateway.current_state().await else {
            tracing::warn!("baseline state fetch failed");
            return Err(Error::StateUnavailable);
        };

        let mut tracker = inner.lock_tracker();
        if tracker.state().generation() != expected_generation {
            tracing::debug!("baseline discarded: state was resynced mid-flight");
            return Ok(());
        }
        tracker.state_mut().adopt_cursor(state);
        tracing::info!(
            seq = state.seq,
            revision = state.revision,
            "baseline cursor adopted"
        );
        Ok(())
    }

    /// Global recovery: fetch and apply everything missed on the common
    /// streams since the current cursor.
    pub(crate) async fn fetch_global_difference(inner: Arc<Self>) {
        let (cursor, generation) = {
            let tracker = inner.lock_tracker();
            (
                tracker.state().cursor().copied(),
                tracker.state().generation(),
            )
        };
        let mut args = match cursor {
            Some(cursor) if cursor.date != 0 => DifferenceArgs {
                revision: cursor.revision,
                date: cursor.date,
                aux: cursor.aux,
            },
            // No usable baseline to diff against.
            _ => {
                Self::full_resync(inner).await;
                return;
            }
        };

        inner
            .dispatcher
            .dispatch(Update::FetchingDifference(FetchingDifference {
                active: true,
            }));

        loop {
            let response = inner.gateway.difference(args).await;

            match response {
                None => {
                    tracing::warn!("global difference unavailable; resyncing");
                    Self::full_resync(inner).await;
                    return;
                }
                Some(Difference::TooLong) => {
                    tracing::info!("global difference too long; resyncing");
                    Self::full_resync(inner).await;
                    return;
                }
                Some(Difference::Empty { seq, date }) => {
                    {
                        let mut tracker = inner.lock_tracker();
                        if tracker.state().generation() == generation {
                            tracker.state_mut().adopt_seq(seq, date);
                        } else {
                            tracing::debug!("empty difference discarded after resync");
                        }
                    }
                    Self::finish_fetching(&inner);
                    return;
                }
                Some(Difference::Page(page)) => {
                    if !Self::generation_holds(&inner, generation) {
                        Self::finish_fetching(&inner);
                        return;
                    }

                    for message in page.messages {
                        inner
                            .dispatcher
                            .dispatch(Update::Event(AppliedEvent::new(message)));
                    }
                    inner.dispatcher.hydrate(&page.entities);

                    let (actions, next) = {
                        let mut tracker = inner.lock_tracker();
                        if tracker.state().generation() != generation {
                            tracing::debug!("difference page discarded after resync");
                            drop(tracker);
                            Self::finish_fetching(&inner);
                            return;
                        }

                        let mut actions = Vec::new();
                        Self::apply_difference_events(&mut tracker, page.events, &mut actions);
                        tracker.state_mut().adopt_cursor(page.state);
                        let next = if page.is_partial {
                            Some(DifferenceArgs {
                                revision: page.state.revision,
                                date: page.state.date,
                                aux: page.state.aux,
                            })
                        } else {
                            // The gap is closed; whatever piled up while we
                            // were fetching can drain now.
                            tracker.pop_global(&mut actions);
                            None
                        };
                        (actions, next)
                    };
                    Self::run_actions(&inner, actions);

                    match next {
                        Some(next_args) => args = next_args,
                        None => {
                            Self::finish_fetching(&inner);
                            tracing::debug!("global difference applied");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Scope recovery: fetch and apply everything one scope missed.
    pub(crate) async fn fetch_scope_difference(inner: Arc<Self>, scope: ScopeId) {
        let (mut revision, generation) = {
            let tracker = inner.lock_tracker();
            match tracker.state().scope_entry(&scope) {
                Some(revision) if revision != 0 => (revision, tracker.state().generation()),
                _ => {
                    tracing::warn!(scope = %scope, "scope difference skipped: scope not tracked");
                    return;
                }
            }
        };
        let Some(credential) = inner.directory.credential(&scope) else {
            tracing::warn!(scope = %scope, "scope difference skipped: no credential");
            return;
        };

        loop {
            let response = inner
                .gateway
                .scope_difference(ScopeDifferenceArgs {
                    scope: scope.clone(),
                    credential: credential.clone(),
                    revision,
                    limit: inner.config.scope_fetch_limit,
                })
                .await;

            let Some(response) = response else {
                // Soft failure; the next gap signal retries.
                tracing::warn!(scope = %scope, "scope difference unavailable");
                return;
            };

            match response {
                ScopeDifference::TooLong => {
                    tracing::info!(scope = %scope, "scope difference too long; resyncing");
                    Self::full_resync(inner).await;
                    return;
                }
                ScopeDifference::Empty {
                    revision: new_revision,
                } => {
                    let actions = {
                        let mut tracker = inner.lock_tracker();
                        if tracker.state().generation() != generation {
                            tracing::debug!(scope = %scope, "scope difference discarded after resync");
                            return;
                        }
                        tracker.state_mut().set_scope_entry(scope.clone(), new_revision);
                        let mut actions = Vec::new();
                        tracker.pop_scope(&scope, &mut actions);
                        actions
                    };
                    Self::run_actions(&inner, actions);
                    return;
                }
                ScopeDifference::Page(page) => {
                    {
                        // Adopt the fresh revision before applying anything,
                        // so interleaved drains use the new baseline.
                        let mut tracker = inner.lock_tracker();
                        if tracker.state().generation() != generation {
                            tracing::debug!(scope = %scope, "scope difference discarded after resync");
                            return;
                        }
                        tracker.state_mut().set_scope_entry(scope.clone(), page.revision);
                    }

                    for message in page.messages {
                        inner
                            .dispatcher
                            .dispatch(Update::Event(AppliedEvent::new(message)));
                    }
                    inner.dispatcher.hydrate(&page.entities);

                    let actions = {
                        let mut tracker = inner.lock_tracker();
                        if tracker.state().generation() != generation {
                            tracing::debug!(scope = %scope, "scope difference discarded after resync");
                            return;
                        }
                        let mut actions = Vec::new();
                        Self::apply_difference_events(&mut tracker, page.events, &mut actions);
                        if page.is_final {
                            tracker.pop_scope(&scope, &mut actions);
                        }
                        actions
                    };
                    Self::run_actions(&inner, actions);

                    if page.is_final {
                        tracing::debug!(scope = %scope, "scope difference applied");
                        return;
                    }
                    revision = page.revision;
                }
            }
        }
    }

    /// Discard all reconciliation state, tell the application to rebuild,
    /// and re-establish a baseline.
    pub(crate) async fn full_resync(inner: Arc<Self>) {
        tracing::info!("full resync started");
        let generation = {
            let mut tracker = inner.lock_tracker();
            tracker.clear_buffers();
            tracker.state_mut().reset();
            tracker.state().generation()
        };
        inner.timers.cancel_all();
        inner.dispatcher.dispatch(Update::RequestResync);

        if Self::load_baseline(&inner, generation).await.is_err() {
            tracing::warn!("resync baseline unavailable; retrying on next reconnect");
        }
    }

    /// Replay difference events through normal classification.
    ///
    /// Events are flagged `from_recovery`, with one exception: once a
    /// too-long marker for a scope shows up in the page, that scope's later
    /// events only get buffered. They drain with strict ordering after the
    /// scope's own recovery resolves.
    fn apply_difference_events(
        tracker: &mut Tracker,
        events: Vec<RawEvent>,
        actions: &mut Vec<Action>,
    ) {
        let mut overflowed: HashSet<ScopeId> = HashSet::new();
        for event in events {
            if let RawEvent::ScopeTooLong(marker) = &event {
                overflowed.insert(marker.scope.clone());
            }
            let mode = if overflowed.contains(&event.scope_hint()) {
                Submit::deferred()
            } else {
                Submit::recovered()
            };
            tracker.submit(event, mode, actions);
        }
    }

    fn generation_holds(inner: &Arc<Self>, generation: u64) -> bool {
        let holds = inner.lock_tracker().state().generation() == generation;
        if !holds {
            tracing::debug!("difference result discarded after resync");
        }
        holds
    }

    fn finish_fetching(inner: &Arc<Self>) {
        inner
            .dispatcher
            .dispatch(Update::FetchingDifference(FetchingDifference {
                active: false,
            }));
    }
}
