use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use helply_core::intent::{candidate_labels, intent_for_label, HYPOTHESIS_TEMPLATE};
use helply_core::{ClassifyError, IntentResult};

/// Ordered classifier output, best label/score at index 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
}

impl Classification {
    pub fn top(&self) -> Option<(&str, f32)> {
        match (self.labels.first(), self.scores.first()) {
            (Some(label), Some(score)) => Some((label.as_str(), *score)),
            _ => None,
        }
    }
}

/// Zero-shot classification capability. Must tolerate arbitrary UTF-8 text
/// including the empty string.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
        hypothesis_template: &str,
    ) -> Result<Classification, ClassifyError>;
}

/// Yields no labels, so every turn resolves to the untrusted default. Used
/// when no NLU endpoint is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopClassifier;

#[async_trait]
impl IntentClassifier for NoopClassifier {
    async fn classify(
        &self,
        _text: &str,
        _candidate_labels: &[String],
        _hypothesis_template: &str,
    ) -> Result<Classification, ClassifyError> {
        Ok(Classification::default())
    }
}

/// Maps raw classifier output onto the canonical intent taxonomy.
pub struct IntentResolver {
    classifier: Arc<dyn IntentClassifier>,
}

impl IntentResolver {
    pub fn new(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self { classifier }
    }

    /// Classification failure is never fatal to the turn: any error, empty
    /// output, or label outside the translation table resolves to
    /// `general_question` at confidence 0.0.
    pub async fn resolve(&self, text: &str) -> IntentResult {
        let labels = candidate_labels();
        let classification = match self.classifier.classify(text, &labels, HYPOTHESIS_TEMPLATE).await
        {
            Ok(classification) => classification,
            Err(error) => {
                warn!(
                    event_name = "engine.classify.failed",
                    error = %error,
                    "intent classification failed; treating as general question"
                );
                return IntentResult::untrusted_default();
            }
        };

        match classification.top() {
            Some((label, score)) => match intent_for_label(label) {
                Some(intent) => IntentResult { intent, confidence: score.clamp(0.0, 1.0) },
                None => {
                    warn!(
                        event_name = "engine.classify.unknown_label",
                        label,
                        "classifier returned a label outside the candidate set"
                    );
                    IntentResult::untrusted_default()
                }
            },
            None => IntentResult::untrusted_default(),
        }
    }
}
