use serde::{Deserialize, Serialize};

/// Closed intent taxonomy.
///
/// The classifier's free-text label space is translated onto this enum at the
/// boundary (`intent_for_label`); nothing downstream branches on raw labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalIntent {
    TrackOrder,
    CreateOrder,
    CountOrders,
    Greeting,
    Goodbye,
    Complaint,
    GeneralQuestion,
}

impl CanonicalIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrackOrder => "track_order",
            Self::CreateOrder => "create_order",
            Self::CountOrders => "count_orders",
            Self::Greeting => "greeting",
            Self::Goodbye => "goodbye",
            Self::Complaint => "complaint",
            Self::GeneralQuestion => "general_question",
        }
    }

    /// Intents answered from structured records, which are only meaningful
    /// for a signed-in caller with a known email.
    pub fn requires_caller_email(&self) -> bool {
        matches!(self, Self::TrackOrder | Self::CreateOrder | Self::CountOrders)
    }

    /// Intents with a dedicated handler in the turn router; everything else
    /// falls through to retrieval/generation.
    pub fn has_structured_handler(&self) -> bool {
        !matches!(self, Self::GeneralQuestion)
    }
}

/// Hypothesis template handed to the zero-shot classifier, with `{}` standing
/// in for the candidate label.
pub const HYPOTHESIS_TEMPLATE: &str = "The user wants to {}.";

/// Candidate labels sent to the classifier and the canonical intent each one
/// folds back into. Several phrasings map onto the same intent.
pub const CANDIDATE_LABELS: &[(&str, CanonicalIntent)] = &[
    ("check order status", CanonicalIntent::TrackOrder),
    ("track a package", CanonicalIntent::TrackOrder),
    ("place a new order", CanonicalIntent::CreateOrder),
    ("buy a product", CanonicalIntent::CreateOrder),
    ("count their orders", CanonicalIntent::CountOrders),
    ("greet the assistant", CanonicalIntent::Greeting),
    ("say goodbye", CanonicalIntent::Goodbye),
    ("file a complaint", CanonicalIntent::Complaint),
    ("ask a general question", CanonicalIntent::GeneralQuestion),
];

pub fn candidate_labels() -> Vec<String> {
    CANDIDATE_LABELS.iter().map(|(label, _)| (*label).to_string()).collect()
}

pub fn intent_for_label(label: &str) -> Option<CanonicalIntent> {
    let normalized = label.trim().to_ascii_lowercase();
    CANDIDATE_LABELS
        .iter()
        .find(|(candidate, _)| *candidate == normalized)
        .map(|(_, intent)| *intent)
}

/// Output of one classification pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntentResult {
    pub intent: CanonicalIntent,
    pub confidence: f32,
}

impl IntentResult {
    /// The resolution used whenever classification fails or yields nothing.
    pub fn untrusted_default() -> Self {
        Self { intent: CanonicalIntent::GeneralQuestion, confidence: 0.0 }
    }

    /// Whether the resolved intent is trusted enough to drive structured
    /// handling. Below the gate the turn falls through to retrieval and
    /// generation regardless of the label.
    pub fn is_trusted(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::{candidate_labels, intent_for_label, CanonicalIntent, IntentResult};

    #[test]
    fn label_table_folds_many_labels_onto_one_intent() {
        assert_eq!(intent_for_label("check order status"), Some(CanonicalIntent::TrackOrder));
        assert_eq!(intent_for_label("track a package"), Some(CanonicalIntent::TrackOrder));
        assert_eq!(intent_for_label("Place A New Order"), Some(CanonicalIntent::CreateOrder));
    }

    #[test]
    fn unknown_labels_do_not_resolve() {
        assert_eq!(intent_for_label("order a pizza"), None);
        assert_eq!(intent_for_label(""), None);
    }

    #[test]
    fn every_candidate_label_is_sent_to_the_classifier() {
        let labels = candidate_labels();
        assert_eq!(labels.len(), super::CANDIDATE_LABELS.len());
        assert!(labels.iter().all(|label| intent_for_label(label).is_some()));
    }

    #[test]
    fn confidence_gate_is_strict() {
        let result = IntentResult { intent: CanonicalIntent::TrackOrder, confidence: 0.4 };
        assert!(!result.is_trusted(0.4));
        assert!(result.is_trusted(0.35));
    }

    #[test]
    fn untrusted_default_is_general_question_at_zero() {
        let result = IntentResult::untrusted_default();
        assert_eq!(result.intent, CanonicalIntent::GeneralQuestion);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_trusted(0.0));
    }
}
