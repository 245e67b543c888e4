use serde::{Deserialize, Serialize};

/// One retrieved reference-text chunk, produced by the retrieval
/// collaborator in descending-score order and never mutated by the engine
/// (truncation during budgeting clones it).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub source: String,
}
