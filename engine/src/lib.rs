//! # Mirror Engine
//!
//! The update-reconciliation core of the Mirror chat client.
//!
//! The server pushes events over a transport that reorders, drops, and
//! occasionally duplicates. This crate keeps the local mirror consistent
//! anyway: it buffers out-of-order events, applies them gapless and in
//! order against monotonically increasing revision counters, and closes
//! detected gaps through debounced catalog-difference fetches.
//!
//! ## Counter spaces
//!
//! Two independent counter spaces are tracked:
//!
//! - the **global sequence**, ordering multi-event envelopes across the
//!   whole session, plus the common revision stream riding on the same
//!   cursor, and
//! - one **per-scope revision** counter per conversation scope, each with
//!   its own buffer and its own recovery path.
//!
//! ## Flow
//!
//! Raw events enter through [`UpdateManager::submit`], get classified, and
//! land in an ordered buffer. Draining applies everything contiguous,
//! dispatches it through [`Dispatcher`], and advances the cursor. A gap
//! parks the stream and arms a debounced recovery timer; when it fires, the
//! missed span is fetched through [`Gateway`] and replayed, and draining
//! resumes. A difference the server refuses to replay escalates to a full
//! resync.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mirror_engine::{
//!     Config, CursorState, Difference, DifferenceArgs, Dispatcher, Directory,
//!     Entity, Gateway, ScopeCredential, ScopeDifference, ScopeDifferenceArgs,
//!     ScopeId, Update, UpdateManager,
//! };
//!
//! struct Rpc;
//!
//! impl Gateway for Rpc {
//!     async fn current_state(&self) -> Option<CursorState> {
//!         // invoke the "get current state" call
//!         None
//!     }
//!     async fn difference(&self, _args: DifferenceArgs) -> Option<Difference> {
//!         None
//!     }
//!     async fn scope_difference(
//!         &self,
//!         _args: ScopeDifferenceArgs,
//!     ) -> Option<ScopeDifference> {
//!         None
//!     }
//! }
//!
//! struct Ui;
//!
//! impl Dispatcher for Ui {
//!     fn dispatch(&self, _update: Update) {}
//!     fn hydrate(&self, _entities: &[Entity]) {}
//! }
//!
//! struct Scopes;
//!
//! impl Directory for Scopes {
//!     fn credential(&self, _scope: &ScopeId) -> Option<ScopeCredential> {
//!         None
//!     }
//! }
//!
//! # async fn run() -> mirror_engine::Result<()> {
//! let manager = UpdateManager::new(Rpc, Ui, Scopes, Config::default());
//! manager.initialize().await?;
//! // feed transport events with manager.submit(...)
//! # Ok(())
//! # }
//! ```

pub mod config;
mod envelope;
pub mod error;
pub mod event;
pub mod gateway;
pub mod manager;
pub mod queue;
mod recovery;
mod scheduler;
pub mod scope;
pub mod state;
mod tracker;

// Re-export main types at crate root
pub use config::Config;
pub use error::{Error, Result};
pub use event::{
    AppliedEvent, Entity, EventBatch, FetchingDifference, PlainEvent, RawEvent, RevisionAck,
    RevisionedEvent, ScopeTooLong, Update,
};
pub use gateway::{
    Difference, DifferenceArgs, DifferencePage, Directory, Dispatcher, Gateway, ScopeDifference,
    ScopeDifferenceArgs, ScopeDifferencePage,
};
pub use manager::UpdateManager;
pub use queue::SortedQueue;
pub use scope::{ScopeCredential, ScopeId};
pub use state::{CursorState, EngineStats};

/// Type aliases for clarity
pub type Seq = u64;
pub type Revision = u64;
pub type Timestamp = u64;
