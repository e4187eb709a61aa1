//! Conversation-scope identity.
//!
//! Every revisioned event belongs to exactly one scope. A reserved sentinel
//! scope carries the common stream: events that are revisioned but not tied
//! to any particular conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel id for the common (non-conversation) revision stream.
const COMMON_SCOPE_ID: &str = "0";

/// Identifier of a conversation scope.
///
/// Scope ids are opaque strings handed over by the transport layer. The
/// engine only distinguishes the common sentinel from everything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    /// Create a scope id from an opaque string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved sentinel scope for the common stream.
    pub fn common() -> Self {
        Self(COMMON_SCOPE_ID.to_string())
    }

    /// Whether this is the common sentinel scope.
    pub fn is_common(&self) -> bool {
        self.0 == COMMON_SCOPE_ID
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ScopeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Access reference required by the per-scope difference call.
///
/// Resolved through [`crate::Directory`] right before a fetch; the engine
/// never interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeCredential(String);

impl ScopeCredential {
    /// Wrap an opaque access reference.
    pub fn new(access_ref: impl Into<String>) -> Self {
        Self(access_ref.into())
    }

    /// The raw access reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
