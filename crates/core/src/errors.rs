use thiserror::Error;

/// Failure reading or writing one of the engine's stores.
///
/// Every store failure is recoverable at the turn level: a failed context
/// read degrades to "no context", a failed order lookup degrades to an
/// apologetic reply, and a failed audit write is swallowed after logging.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("store failure: {0}")]
pub struct StoreError(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("classification failure: {0}")]
pub struct ClassifyError(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("retrieval failure: {0}")]
pub struct RetrieveError(pub String);

/// Generation failures are not homogeneous: only capacity errors are worth
/// retrying, anything else will recur identically on the same input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("generation rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerateError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
