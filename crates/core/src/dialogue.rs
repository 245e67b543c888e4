use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Per-session conversational state.
///
/// At most one pending clarification exists per session; writing a new tag
/// overwrites the previous one, it never stacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextTag {
    AwaitingClarification,
}

impl ContextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingClarification => "AWAITING_CLARIFICATION",
        }
    }

    /// Tolerant of unknown tags left behind by older deployments: anything
    /// unrecognized reads back as "no context".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "AWAITING_CLARIFICATION" => Some(Self::AwaitingClarification),
            _ => None,
        }
    }
}

/// Durable per-session context, keyed by session id so a second process or a
/// restart sees the same pending disambiguation. Same-session writes are
/// last-write-wins; no linearizability is required across concurrent turns
/// of one session.
#[async_trait]
pub trait DialogueStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ContextTag>, StoreError>;
    async fn set(&self, session_id: &str, tag: Option<ContextTag>) -> Result<(), StoreError>;
}
