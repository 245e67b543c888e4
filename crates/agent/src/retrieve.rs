use async_trait::async_trait;

use helply_core::{RetrieveError, RetrievedChunk};

/// Vector-similarity retrieval capability. Results arrive in descending
/// score order; an empty list means no index is loaded.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<RetrievedChunk>, RetrieveError>;
}

/// Retrieval disabled: every search returns no chunks, pushing the router
/// onto the general generation path.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    async fn search(
        &self,
        _query: &str,
        _top_k: u32,
    ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        Ok(Vec::new())
    }
}
