//! Order disambiguation.
//!
//! Two pure entry points over the caller's candidate orders:
//! [`resolve_intent`] for a fresh tracking request and [`resolve_answer`]
//! for the follow-up turn that answers an open clarification. Matching is
//! deliberately simple: case-insensitive bidirectional substring containment
//! between the turn text and each item label, first match wins. No scoring
//! or edit distance; partial word overlaps can mismatch, and upgrading the
//! matcher is an explicit behavior change, not a drive-by.

use crate::dialogue::ContextTag;
use crate::domain::order::OrderRecord;

/// How a resolution should change the session's dialogue context. The
/// resolver never touches the store itself; the turn router applies this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextChange {
    Keep,
    Set(ContextTag),
    Clear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchOutcome {
    pub reply: String,
    pub matched: Option<OrderRecord>,
    pub context: ContextChange,
}

pub const CLARIFICATION_QUESTION: &str = "Which order are you talking about?";
pub const NO_ORDERS_REPLY: &str = "You don't have any active orders right now.";
pub const UNMATCHED_ANSWER_REPLY: &str =
    "I couldn't match that to one of your orders. Please tell me the exact item name.";

const LISTED_ITEM_LIMIT: usize = 3;

/// Resolve the answer turn of an open clarification.
///
/// On a match the context is cleared; on no match it stays
/// `AwaitingClarification` and the caller is asked to repeat the exact item
/// name, so re-asking is idempotent.
pub fn resolve_answer(text: &str, candidates: &[OrderRecord]) -> MatchOutcome {
    match find_named(text, candidates).first() {
        Some(order) => MatchOutcome {
            reply: order_detail(order),
            matched: Some((*order).clone()),
            context: ContextChange::Clear,
        },
        None => MatchOutcome {
            reply: UNMATCHED_ANSWER_REPLY.to_string(),
            matched: None,
            context: ContextChange::Keep,
        },
    }
}

/// Resolve a fresh tracking request with no clarification pending.
///
/// Policy, in order: empty candidate set is terminal; a uniquely named
/// candidate answers directly; a lone candidate answers directly (no
/// ambiguity possible); otherwise list up to three item labels, ask which
/// one, and open a clarification. Rule 4 is the only transition into
/// `AwaitingClarification` anywhere in the engine.
pub fn resolve_intent(text: &str, candidates: &[OrderRecord]) -> MatchOutcome {
    if candidates.is_empty() {
        return MatchOutcome {
            reply: NO_ORDERS_REPLY.to_string(),
            matched: None,
            context: ContextChange::Keep,
        };
    }

    let named = find_named(text, candidates);
    if let [order] = named.as_slice() {
        return MatchOutcome {
            reply: order_detail(order),
            matched: Some((*order).clone()),
            context: ContextChange::Keep,
        };
    }

    if let [order] = candidates {
        return MatchOutcome {
            reply: order_detail(order),
            matched: Some(order.clone()),
            context: ContextChange::Keep,
        };
    }

    let listed: Vec<&str> =
        candidates.iter().take(LISTED_ITEM_LIMIT).map(|order| order.item_name.as_str()).collect();
    let remainder = candidates.len().saturating_sub(LISTED_ITEM_LIMIT);
    let reply = if remainder > 0 {
        format!(
            "I found several orders: {} (and {} more). {}",
            listed.join(", "),
            remainder,
            CLARIFICATION_QUESTION
        )
    } else {
        format!("I found several orders: {}. {}", listed.join(", "), CLARIFICATION_QUESTION)
    };

    MatchOutcome {
        reply,
        matched: None,
        context: ContextChange::Set(ContextTag::AwaitingClarification),
    }
}

/// Candidates whose item label matches the text, in the supplied
/// (descending-recency) order.
fn find_named<'a>(text: &str, candidates: &'a [OrderRecord]) -> Vec<&'a OrderRecord> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return Vec::new();
    }
    candidates.iter().filter(|order| contains_either_way(&text, &order.item_name)).collect()
}

fn contains_either_way(lowered_text: &str, label: &str) -> bool {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return false;
    }
    lowered_text.contains(&label) || label.contains(lowered_text)
}

fn order_detail(order: &OrderRecord) -> String {
    format!(
        "Your order for {} is {}. Expected delivery: {}.",
        order.item_name, order.status, order.delivery_date
    )
}
