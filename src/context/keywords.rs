use std::collections::HashSet;

/// Interrogative lead words that are capitalised only because they open the question.
const LEAD_WORDS: &[&str] = &[
    "Will", "Would", "Does", "Do", "Did", "Is", "Are", "Was", "Can", "Could", "Should", "Has",
    "Have", "Which", "What", "Who", "When", "How", "The",
];

/// Best-effort search keywords: capitalised tokens of two or more characters, in order of
/// first appearance, de-duplicated case-insensitively, capped at `max`.
pub fn extract_keywords(question: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in question.split_whitespace() {
        if out.len() >= max {
            break;
        }
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() < 2 {
            continue;
        }
        if !word.chars().next().is_some_and(char::is_uppercase) {
            continue;
        }
        if LEAD_WORDS.contains(&word) {
            continue;
        }
        if seen.insert(word.to_lowercase()) {
            out.push(word.to_string());
        }
    }
    out
}

/// `(k1 OR k2 OR k3)`, or `None` when there is nothing to search for.
pub fn news_query(keywords: &[String]) -> Option<String> {
    if keywords.is_empty() {
        return None;
    }
    Some(format!("({})", keywords.join(" OR ")))
}

pub fn social_query(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return "Polymarket".to_string();
    }
    keywords.join(" OR ")
}
