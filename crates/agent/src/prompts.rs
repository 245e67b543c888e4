//! Prompt templates. Pure string construction over the orchestrator; none
//! of these retry or branch on their own.

/// Retrieval-augmented variant: grounded in the assembled sources, with a
/// citation instruction and a strict refusal when the sources fall short.
pub fn rag_prompt(question: &str, context: &str) -> String {
    format!(
        "SYSTEM: You are a helpful support assistant. Answer using only the sources below \
         and name the source you used. If the sources do not contain the answer, say you \
         don't know.\n\nSOURCES:\n{context}\n\nQUESTION: {question}"
    )
}

/// Open variant used when retrieval produced nothing relevant.
pub fn general_prompt(question: &str) -> String {
    format!(
        "SYSTEM: You are a helpful support assistant. Answer concisely and admit \
         uncertainty when you are not sure.\n\nQUESTION: {question}"
    )
}

/// Constrained extraction call for `create_order`.
pub fn extraction_prompt(text: &str) -> String {
    format!(
        "Extract the product the user wants to order from the message below. Return only \
         the product name, or 'None' if no product is mentioned.\n\nMESSAGE: {text}"
    )
}

/// Interpret the extraction call's raw output. Quotes and trailing
/// punctuation are the model's habit, not signal.
pub fn parse_extracted_item(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches(&['"', '\'', '.', '`'][..]).trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(cleaned.to_string())
    }
}
