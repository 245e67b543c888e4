use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::chunk::RetrievedChunk;
use crate::errors::StoreError;
use crate::intent::CanonicalIntent;

/// Provenance reference to a chunk that contributed to a reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub id: String,
    pub source: String,
    pub score: f32,
}

impl From<&RetrievedChunk> for ChunkRef {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self { id: chunk.id.clone(), source: chunk.source.clone(), score: chunk.score }
    }
}

/// Final output of a turn: the only artifact handed onward for persistence
/// and for the caller-facing response.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub text: String,
    pub intent: CanonicalIntent,
    pub sources: Vec<ChunkRef>,
    pub model_ms: Option<u64>,
    pub success: bool,
}

impl Reply {
    pub fn structured(text: impl Into<String>, intent: CanonicalIntent) -> Self {
        Self { text: text.into(), intent, sources: Vec::new(), model_ms: None, success: true }
    }
}

/// Projection of one completed turn for the audit trail.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnRecord {
    pub user_id: Option<String>,
    pub session_id: String,
    pub transcript: String,
    pub intent: CanonicalIntent,
    pub reply: String,
    pub model_text: Option<String>,
    pub sources: Vec<ChunkRef>,
    pub confidence: Option<f32>,
    pub model_ms: Option<u64>,
    pub success: bool,
}

/// Persistence sink for completed turns. Fire-and-forget from the engine's
/// perspective: errors are logged at the call site, never propagated into
/// the reply.
#[async_trait]
pub trait TurnSink: Send + Sync {
    /// Returns the persisted record id.
    async fn record(&self, record: &TurnRecord) -> Result<String, StoreError>;
}
