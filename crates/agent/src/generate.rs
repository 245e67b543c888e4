use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use helply_core::GenerateError;

/// Single-turn completion capability. `Ok(None)` means the model had
/// nothing to say, which is distinct from any failure.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<Option<String>, GenerateError>;
}

/// Generation disabled: every completion yields nothing, so the router
/// falls back to its fixed strings. Used when no API key is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopGenerator;

#[async_trait]
impl Generator for NoopGenerator {
    async fn complete(
        &self,
        _prompt: &str,
        _max_output_tokens: u32,
        _temperature: f32,
    ) -> Result<Option<String>, GenerateError> {
        Ok(None)
    }
}

/// Caller-facing terminal text once rate-limit retries are exhausted.
pub const RATE_LIMIT_APOLOGY: &str =
    "I'm receiving a lot of requests right now. Please try again in a moment.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The model produced text.
    Text(String),
    /// The model completed but had nothing to say.
    Empty,
    /// Every attempt was rate limited; callers surface [`RATE_LIMIT_APOLOGY`].
    RateLimitExhausted,
    /// A non-capacity failure; retrying would fail identically.
    Failed(String),
}

/// Wraps the generator capability with the engine's retry discipline: rate
/// limits back off `2 * (attempt + 1)` seconds and retry up to the attempt
/// budget; any other failure is returned after a single attempt.
pub struct GenerationOrchestrator {
    generator: Arc<dyn Generator>,
    max_retries: u32,
    max_output_tokens: u32,
    temperature: f32,
}

impl GenerationOrchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        max_retries: u32,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self { generator, max_retries: max_retries.max(1), max_output_tokens, temperature }
    }

    pub async fn complete(&self, prompt: &str) -> GenerationOutcome {
        for attempt in 0..self.max_retries {
            match self
                .generator
                .complete(prompt, self.max_output_tokens, self.temperature)
                .await
            {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    return GenerationOutcome::Text(text.trim().to_string());
                }
                Ok(_) => return GenerationOutcome::Empty,
                Err(GenerateError::RateLimited { retry_after_secs }) => {
                    let wait_secs = 2 * (u64::from(attempt) + 1);
                    warn!(
                        event_name = "engine.generate.rate_limited",
                        attempt,
                        wait_secs,
                        retry_after_secs = ?retry_after_secs,
                        "generator rate limited; backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                }
                Err(GenerateError::Other(message)) => {
                    error!(
                        event_name = "engine.generate.failed",
                        error = %message,
                        "generation failed; not retrying"
                    );
                    return GenerationOutcome::Failed(message);
                }
            }
        }

        GenerationOutcome::RateLimitExhausted
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use helply_core::GenerateError;

    use super::{GenerationOrchestrator, GenerationOutcome, Generator};

    struct ScriptedGenerator {
        calls: AtomicU32,
        rate_limited_first: u32,
        then: Result<Option<String>, GenerateError>,
    }

    impl ScriptedGenerator {
        fn new(rate_limited_first: u32, then: Result<Option<String>, GenerateError>) -> Self {
            Self { calls: AtomicU32::new(0), rate_limited_first, then }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn complete(
            &self,
            _prompt: &str,
            _max_output_tokens: u32,
            _temperature: f32,
        ) -> Result<Option<String>, GenerateError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.rate_limited_first {
                Err(GenerateError::RateLimited { retry_after_secs: None })
            } else {
                self.then.clone()
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_are_retried_with_linear_backoff() {
        let generator =
            Arc::new(ScriptedGenerator::new(2, Ok(Some("recovered answer".to_string()))));
        let orchestrator = GenerationOrchestrator::new(generator.clone(), 3, 500, 0.3);

        let started = tokio::time::Instant::now();
        let outcome = orchestrator.complete("prompt").await;

        assert_eq!(outcome, GenerationOutcome::Text("recovered answer".to_string()));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        // Two rate-limited attempts: 2s after the first, 4s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_rate_limits_are_a_terminal_outcome() {
        let generator = Arc::new(ScriptedGenerator::new(u32::MAX, Ok(None)));
        let orchestrator = GenerationOrchestrator::new(generator.clone(), 3, 500, 0.3);

        let outcome = orchestrator.complete("prompt").await;

        assert_eq!(outcome, GenerationOutcome::RateLimitExhausted);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_capacity_failures_are_not_retried() {
        let generator = Arc::new(ScriptedGenerator::new(
            0,
            Err(GenerateError::Other("upstream 500".to_string())),
        ));
        let orchestrator = GenerationOrchestrator::new(generator.clone(), 3, 500, 0.3);

        let outcome = orchestrator.complete("prompt").await;

        assert_eq!(outcome, GenerationOutcome::Failed("upstream 500".to_string()));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_model_output_is_reported_as_empty() {
        let generator = Arc::new(ScriptedGenerator::new(0, Ok(Some("   ".to_string()))));
        let orchestrator = GenerationOrchestrator::new(generator, 3, 500, 0.3);

        assert_eq!(orchestrator.complete("prompt").await, GenerationOutcome::Empty);
    }

    #[tokio::test]
    async fn produced_text_is_trimmed() {
        let generator = Arc::new(ScriptedGenerator::new(0, Ok(Some("  answer \n".to_string()))));
        let orchestrator = GenerationOrchestrator::new(generator, 3, 500, 0.3);

        assert_eq!(orchestrator.complete("prompt").await, GenerationOutcome::Text("answer".to_string()));
    }
}
