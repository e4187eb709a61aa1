//! Boundary traits toward the surrounding application.
//!
//! The engine talks to three collaborators: the RPC gateway that serves
//! difference fetches, the dispatcher that feeds applied state to the UI
//! layer, and the directory that resolves scope access credentials. Soft
//! RPC failures are `None`, never errors; the caller's retry policy lives
//! behind the gateway.

use crate::event::{Entity, RawEvent, Update};
use crate::state::CursorState;
use crate::{Revision, ScopeCredential, ScopeId, Seq, Timestamp};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Arguments of the global difference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferenceArgs {
    /// Last applied revision of the common stream.
    pub revision: Revision,
    /// Timestamp of the last applied envelope.
    pub date: Timestamp,
    /// Auxiliary cursor of the secondary feed.
    pub aux: u64,
}

/// One page of a global difference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferencePage {
    /// Authoritative message snapshots, dispatched without ordering checks.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    /// Entities referenced by this page.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Events to replay through normal classification.
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Cursor to adopt after this page: the intermediate state for partial
    /// pages, the final state otherwise.
    pub state: CursorState,
    /// More pages remain after this one.
    pub is_partial: bool,
}

/// Outcome of the global difference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Difference {
    /// Nothing missed; adopt the returned sequence position.
    Empty { seq: Seq, date: Timestamp },
    /// The gap outgrew what a difference can replay; resync from scratch.
    TooLong,
    /// A page of missed events.
    Page(DifferencePage),
}

/// Arguments of the per-scope difference call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDifferenceArgs {
    /// The scope to catch up.
    pub scope: ScopeId,
    /// Access reference resolved through [`Directory`].
    pub credential: ScopeCredential,
    /// The scope's last applied revision.
    pub revision: Revision,
    /// Maximum number of events per page.
    pub limit: u32,
}

/// One page of a per-scope difference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDifferencePage {
    /// Authoritative message snapshots, dispatched without ordering checks.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    /// Entities referenced by this page.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Events to replay through normal classification.
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Revision to adopt after this page.
    pub revision: Revision,
    /// No pages remain after this one.
    pub is_final: bool,
}

/// Outcome of the per-scope difference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScopeDifference {
    /// Nothing missed; adopt the returned revision.
    Empty { revision: Revision },
    /// The scope's backlog outgrew the difference; resync from scratch.
    TooLong,
    /// A page of missed events.
    Page(ScopeDifferencePage),
}

/// RPC boundary serving baseline and difference fetches.
///
/// `None` is a soft failure: the engine gives up on the current attempt and
/// relies on the next gap signal or reconnect to retry. Transport-level
/// retries belong behind this trait, not in the engine.
pub trait Gateway: Send + Sync + 'static {
    /// Fetch the authoritative global cursor ("get current state").
    fn current_state(&self) -> impl Future<Output = Option<CursorState>> + Send;

    /// Fetch everything missed since the given cursor position.
    fn difference(&self, args: DifferenceArgs)
        -> impl Future<Output = Option<Difference>> + Send;

    /// Fetch everything one scope missed since its last revision.
    fn scope_difference(
        &self,
        args: ScopeDifferenceArgs,
    ) -> impl Future<Output = Option<ScopeDifference>> + Send;
}

/// One-way sink toward the UI layer.
pub trait Dispatcher: Send + Sync + 'static {
    /// Hand over an applied event or an engine status signal.
    fn dispatch(&self, update: Update);

    /// Merge referenced entities into the application cache and notify the
    /// UI of the change, so later lookups by id succeed.
    fn hydrate(&self, entities: &[Entity]);
}

/// Scope metadata lookups owned by the application.
pub trait Directory: Send + Sync + 'static {
    /// Access reference for a scope's difference call; `None` aborts the
    /// recovery attempt silently.
    fn credential(&self, scope: &ScopeId) -> Option<ScopeCredential>;
}
