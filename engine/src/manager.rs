//! The update manager: entry points, shared state, side-effect execution.
//!
//! All mutation funnels through one tracker lock that is never held across
//! an await, so the engine behaves as a single logical thread interleaved
//! only at its own suspension points. Drains run synchronously inside the
//! lock; the side effects they request (dispatching, arming timers,
//! spawning fetches) run right after it is released.

use crate::config::Config;
use crate::error::Result;
use crate::event::{RawEvent, RevisionAck};
use crate::gateway::{Directory, Dispatcher, Gateway};
use crate::scheduler::{RecoveryTimers, StreamKey};
use crate::state::{CursorState, EngineStats};
use crate::tracker::{Action, Submit, Tracker};
use crate::{Revision, ScopeId};
use std::sync::{Arc, Mutex, MutexGuard};

/// Reconciles the push-event stream against the local mirror.
///
/// Cheap to clone; clones share the same engine state. Must live inside a
/// tokio runtime: gap recovery arms timers and spawns fetch tasks.
pub struct UpdateManager<G, D, Y> {
    inner: Arc<Inner<G, D, Y>>,
}

impl<G, D, Y> Clone for UpdateManager<G, D, Y> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<G, D, Y> {
    pub(crate) gateway: G,
    pub(crate) dispatcher: D,
    pub(crate) directory: Y,
    pub(crate) config: Config,
    pub(crate) tracker: Mutex<Tracker>,
    pub(crate) timers: RecoveryTimers,
}

impl<G, D, Y> UpdateManager<G, D, Y>
where
    G: Gateway,
    D: Dispatcher,
    Y: Directory,
{
    /// Create an engine wired to its collaborators. No baseline exists yet;
    /// events are dropped until [`initialize`](Self::initialize) completes.
    pub fn new(gateway: G, dispatcher: D, directory: Y, config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                dispatcher,
                directory,
                config,
                tracker: Mutex::new(Tracker::new()),
                timers: RecoveryTimers::new(),
            }),
        }
    }

    /// Adopt the baseline cursor from the gateway and schedule an initial
    /// catch-up fetch.
    ///
    /// On [`Error::StateUnavailable`](crate::Error::StateUnavailable) the
    /// engine stays uninitialized; call again when the transport recovers.
    pub async fn initialize(&self) -> Result<()> {
        let generation = self.inner.lock_tracker().state().generation();
        Inner::load_baseline(&self.inner, generation).await?;
        Inner::schedule_global(&self.inner);
        Ok(())
    }

    /// Feed one push event from the transport into the engine.
    pub fn submit(&self, event: RawEvent) {
        self.submit_with(event, Submit::live());
    }

    /// Feed an event replayed out of an external recovery path. Ordering
    /// checks relax for revisions at or past the adopted baseline.
    pub fn submit_from_recovery(&self, event: RawEvent) {
        self.submit_with(event, Submit::recovered());
    }

    fn submit_with(&self, event: RawEvent, mode: Submit) {
        let actions = {
            let mut tracker = self.inner.lock_tracker();
            let mut actions = Vec::new();
            tracker.submit(event, mode, &mut actions);
            actions
        };
        Inner::run_actions(&self.inner, actions);
    }

    /// The transport reconnected; catch up on whatever was missed while
    /// offline. A no-op before initialization.
    pub fn connected(&self) {
        let ready = self.inner.lock_tracker().state().is_ready();
        if ready {
            Inner::schedule_global(&self.inner);
        }
    }

    /// Discard all reconciliation state and re-establish a baseline.
    pub async fn force_resync(&self) {
        Inner::full_resync(Arc::clone(&self.inner)).await;
    }

    /// Seed or refresh a scope's revision, e.g. when the application loads
    /// a conversation. A tracked scope found behind the observed revision
    /// is scheduled for recovery instead of jumping.
    pub fn observe_scope_revision(&self, scope: &ScopeId, revision: Revision) {
        let actions = {
            let mut tracker = self.inner.lock_tracker();
            let mut actions = Vec::new();
            tracker.observe_scope(scope, revision, &mut actions);
            actions
        };
        Inner::run_actions(&self.inner, actions);
    }

    /// Consume revision units acknowledged by an RPC side effect (bulk
    /// actions report the revisions they burned through their responses).
    pub fn acknowledge_revisions(
        &self,
        scope: Option<ScopeId>,
        revision: Revision,
        revision_count: u64,
    ) {
        self.submit(RawEvent::Ack(RevisionAck::new(
            scope,
            revision,
            revision_count,
        )));
    }

    /// Whether a baseline cursor has been adopted.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock_tracker().state().is_ready()
    }

    /// The current global cursor, if initialized.
    pub fn cursor(&self) -> Option<CursorState> {
        self.inner.lock_tracker().state().cursor().copied()
    }

    /// A scope's last applied revision, if tracked.
    pub fn scope_revision(&self, scope: &ScopeId) -> Option<Revision> {
        self.inner.lock_tracker().state().revision_of(scope)
    }

    /// Drop diagnostics.
    pub fn stats(&self) -> EngineStats {
        self.inner.lock_tracker().state().stats()
    }
}

impl<G, D, Y> Inner<G, D, Y>
where
    G: Gateway,
    D: Dispatcher,
    Y: Directory,
{
    pub(crate) fn lock_tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().expect("tracker lock poisoned")
    }

    /// Execute the side effects a drain requested, in order. Never called
    /// with the tracker lock held: dispatchers may call back into the
    /// engine synchronously.
    pub(crate) fn run_actions(inner: &Arc<Self>, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Dispatch(update) => inner.dispatcher.dispatch(update),
                Action::ScheduleGlobal => Self::schedule_global(inner),
                Action::ScheduleScope(scope) => Self::schedule_scope(inner, scope),
                Action::RecoverScopeNow(scope) => {
                    let task_inner = Arc::clone(inner);
                    tokio::spawn(async move {
                        Inner::fetch_scope_difference(task_inner, scope).await;
                    });
                }
                Action::ClearGlobalTimer => inner.timers.cancel(&StreamKey::Global),
                Action::ClearScopeTimer(scope) => {
                    inner.timers.cancel(&StreamKey::Scope(scope));
                }
            }
        }
    }

    pub(crate) fn schedule_global(inner: &Arc<Self>) {
        let task_inner = Arc::clone(inner);
        let armed = inner.timers.arm(
            StreamKey::Global,
            inner.config.recovery_debounce,
            async move {
                Inner::fetch_global_difference(task_inner).await;
            },
        );
        if armed {
            tracing::debug!("global recovery scheduled");
        }
    }

    pub(crate) fn schedule_scope(inner: &Arc<Self>, scope: ScopeId) {
        let task_inner = Arc::clone(inner);
        let task_scope = scope.clone();
        let armed = inner.timers.arm(
            StreamKey::Scope(scope.clone()),
            inner.config.recovery_debounce,
            async move {
                Inner::fetch_scope_difference(task_inner, task_scope).await;
            },
        );
        if armed {
            tracing::debug!(scope = %scope, "scope recovery scheduled");
        }
    }
}
