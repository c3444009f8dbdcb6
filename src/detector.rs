//! Question detection
//!
//! Pure classifier deciding whether free-form speech reads as a question.
//! Used only in free-form Q&A mode; interview answers are never filtered.

use std::sync::LazyLock;

use regex::Regex;

/// Words a question commonly starts with (interrogatives and auxiliaries)
const QUESTION_STARTERS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "can", "could", "would", "should",
    "is", "are", "do", "does", "am", "was", "were", "have", "has", "had", "will", "shall",
];

/// Phrases that indicate a question anywhere in the text
const QUESTION_PHRASES: &[&str] = &[
    "tell me about",
    "i'd like to know",
    "can you explain",
    "i was wondering",
    "do you know",
    "what about",
    "how about",
];

/// Inverted word order, e.g. "are you", "can we"
static INVERTED_ORDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(are|can|could|do|does|have|has|will|shall|should|would|am|is)\s")
        .expect("valid regex")
});

/// Leading interrogative used when normalizing typed questions
static LEADS_WITH_INTERROGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(what|why|how|when|where|who|which|can|could|would|should|is|are|do|does|am|was|were|have|has|had|will|shall)\b",
    )
    .expect("valid regex")
});

/// Decide whether text reads as a question
#[must_use]
pub fn is_question(text: &str) -> bool {
    let text = text.trim().to_lowercase();

    if QUESTION_STARTERS
        .iter()
        .any(|starter| text.starts_with(starter))
    {
        return true;
    }

    if text.ends_with('?') {
        return true;
    }

    if INVERTED_ORDER.is_match(&text) {
        return true;
    }

    QUESTION_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// Normalize a question: capitalize the first letter and ensure a
/// trailing `?` when the text leads with an interrogative
#[must_use]
pub fn normalize_question(text: &str) -> String {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    let mut chars = cleaned.chars();
    let first = chars.next().map(|c| c.to_uppercase().to_string());
    let mut normalized = first.unwrap_or_default() + chars.as_str();

    if !normalized.ends_with('?') && LEADS_WITH_INTERROGATIVE.is_match(&normalized) {
        normalized.push('?');
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrogative_start() {
        assert!(is_question("what is a container?"));
        assert!(is_question("How does DNS work"));
        assert!(is_question("Can you explain Docker?"));
    }

    #[test]
    fn test_statement_is_not_a_question() {
        assert!(!is_question("containers are isolated environments"));
        assert!(!is_question("the deploy finished"));
    }

    #[test]
    fn test_trailing_question_mark() {
        assert!(is_question("kubernetes?"));
    }

    #[test]
    fn test_question_phrase() {
        assert!(is_question("please tell me about git rebases"));
        assert!(is_question("i was wondering if this works"));
    }

    #[test]
    fn test_normalize_capitalizes_and_appends_mark() {
        assert_eq!(normalize_question("what is rust"), "What is rust?");
        assert_eq!(normalize_question("what is rust?"), "What is rust?");
    }

    #[test]
    fn test_normalize_leaves_non_interrogative_alone() {
        assert_eq!(normalize_question("rust ownership"), "Rust ownership");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_question("   "), "");
    }
}
