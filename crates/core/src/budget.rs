//! Prompt-context assembly under a token budget.
//!
//! Chunks are consumed in the order supplied (the retriever guarantees
//! relevance-descending order) and assembly stops at the first chunk that
//! does not fit fully, preserving relevance ordering over completeness.

use crate::domain::chunk::RetrievedChunk;

/// Tokens reserved for prompt scaffolding around the context and question.
pub const PROMPT_OVERHEAD_TOKENS: usize = 200;

/// Minimum budget left over before a partial chunk is worth appending.
pub const TRUNCATION_FLOOR_TOKENS: usize = 50;

const CHARS_PER_TOKEN: usize = 4;

/// Token-cost estimation for budget arithmetic. Implementations must be
/// deterministic: the same text always costs the same.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// The chars/4 fallback used wherever a real tokenizer is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 1;
        }
        (text.chars().count() / CHARS_PER_TOKEN).max(1)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub used: Vec<RetrievedChunk>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Build a prompt-ready context string constrained to `token_budget`.
///
/// Guarantees: the output never exceeds the budget, `used` is a prefix (by
/// relevance order) of the input, and at most the last used entry is
/// truncated. A budget too small for anything yields an empty context,
/// never an error.
pub fn assemble_context(
    chunks: &[RetrievedChunk],
    question: &str,
    token_budget: usize,
    estimator: &dyn TokenEstimator,
) -> AssembledContext {
    let reserved = estimator.estimate(question) + PROMPT_OVERHEAD_TOKENS;
    let mut remaining = match token_budget.checked_sub(reserved) {
        Some(remaining) if remaining > 0 => remaining,
        _ => return AssembledContext::default(),
    };

    let mut parts = Vec::new();
    let mut used = Vec::new();

    for chunk in chunks {
        let cost = estimator.estimate(&chunk.text);
        if cost <= remaining {
            parts.push(source_block(&chunk.source, &chunk.text));
            used.push(chunk.clone());
            remaining -= cost;
        } else {
            if remaining > TRUNCATION_FLOOR_TOKENS {
                let snippet: String = chunk.text.chars().take(remaining * CHARS_PER_TOKEN).collect();
                parts.push(source_block(&chunk.source, &snippet));
                used.push(RetrievedChunk { text: snippet, ..chunk.clone() });
            }
            break;
        }
    }

    AssembledContext { text: parts.join("\n\n"), used }
}

fn source_block(source: &str, text: &str) -> String {
    format!("Source: {source}\n{text}")
}

#[cfg(test)]
mod tests {
    use super::{
        assemble_context, AssembledContext, HeuristicEstimator, TokenEstimator,
        PROMPT_OVERHEAD_TOKENS, TRUNCATION_FLOOR_TOKENS,
    };
    use crate::domain::chunk::RetrievedChunk;

    fn chunk(id: &str, score: f32, text: String) -> RetrievedChunk {
        RetrievedChunk { id: id.to_string(), score, text, source: "faq".to_string() }
    }

    #[test]
    fn heuristic_estimator_is_chars_over_four_with_a_floor_of_one() {
        let estimator = HeuristicEstimator;
        assert_eq!(estimator.estimate(""), 1);
        assert_eq!(estimator.estimate("abc"), 1);
        assert_eq!(estimator.estimate(&"x".repeat(400)), 100);
    }

    #[test]
    fn exhausted_budget_returns_empty_context_without_error() {
        let chunks = vec![chunk("1", 0.9, "some reference text".to_string())];
        let question = "q".repeat(40);

        let assembled =
            assemble_context(&chunks, &question, PROMPT_OVERHEAD_TOKENS, &HeuristicEstimator);
        assert_eq!(assembled, AssembledContext::default());

        // Exactly consumed budget (remainder zero) is also empty.
        let budget = PROMPT_OVERHEAD_TOKENS + HeuristicEstimator.estimate(&question);
        let assembled = assemble_context(&chunks, &question, budget, &HeuristicEstimator);
        assert!(assembled.is_empty());
    }

    #[test]
    fn assembled_text_stays_within_the_reserved_budget() {
        let estimator = HeuristicEstimator;
        let chunks = vec![
            chunk("1", 0.9, "a".repeat(400)),
            chunk("2", 0.8, "b".repeat(400)),
            chunk("3", 0.7, "c".repeat(400)),
        ];
        let question = "how do refunds work?";
        let budget = estimator.estimate(question) + PROMPT_OVERHEAD_TOKENS + 150;

        let assembled = assemble_context(&chunks, question, budget, &estimator);

        assert_eq!(assembled.used.len(), 1);
        assert!(estimator.estimate(&assembled.text) <= 150);
    }

    #[test]
    fn used_chunks_are_a_prefix_of_the_input() {
        let estimator = HeuristicEstimator;
        let chunks = vec![
            chunk("1", 0.9, "a".repeat(200)),
            chunk("2", 0.8, "b".repeat(200)),
            chunk("3", 0.7, "c".repeat(4000)),
            chunk("4", 0.6, "d".repeat(8)),
        ];
        let question = "anything";
        // Room for the first two chunks plus a truncated third; the fourth
        // would fit but must not be considered after the truncation stop.
        let budget = estimator.estimate(question) + PROMPT_OVERHEAD_TOKENS + 200;

        let assembled = assemble_context(&chunks, question, budget, &estimator);

        let ids: Vec<&str> = assembled.used.iter().map(|used| used.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(assembled.used[2].text.chars().count() < 4000);
    }

    #[test]
    fn first_oversized_chunk_is_truncated_to_the_character_budget() {
        let estimator = HeuristicEstimator;
        let chunks = vec![chunk("1", 0.9, "z".repeat(4000))];
        let question = "q";
        let remaining = 100usize;
        let budget = estimator.estimate(question) + PROMPT_OVERHEAD_TOKENS + remaining;

        let assembled = assemble_context(&chunks, question, budget, &estimator);

        assert_eq!(assembled.used.len(), 1);
        assert_eq!(assembled.used[0].text.chars().count(), remaining * 4);
        assert!(assembled.text.ends_with(&assembled.used[0].text));
    }

    #[test]
    fn truncation_is_skipped_below_the_floor() {
        let estimator = HeuristicEstimator;
        let chunks = vec![chunk("1", 0.9, "z".repeat(4000))];
        let question = "q";
        let budget = estimator.estimate(question) + PROMPT_OVERHEAD_TOKENS + TRUNCATION_FLOOR_TOKENS;

        let assembled = assemble_context(&chunks, question, budget, &estimator);
        assert!(assembled.is_empty());
    }

    #[test]
    fn no_chunks_yields_an_empty_context() {
        let assembled = assemble_context(&[], "question", 1000, &HeuristicEstimator);
        assert!(assembled.is_empty());
        assert!(assembled.text.is_empty());
    }
}
