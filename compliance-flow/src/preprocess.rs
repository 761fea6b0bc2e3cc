use regex::Regex;
use std::sync::LazyLock;

use crate::config::FlowConfig;

pub const TRUNCATION_MARKER: &str = "... [document truncated]";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

// Each pattern runs lazily from its keyword up to the next blank line.
static KEY_SECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)(?:strengths|positive aspects).*?(?:\n\s*\n|\z)",
        r"(?is)(?:areas for improvement|issues|concerns).*?(?:\n\s*\n|\z)",
        r"(?is)(?:recommendations|suggestions).*?(?:\n\s*\n|\z)",
        r"(?is)(?:not met.*?requirements?|non.?compliant).*?(?:\n\s*\n|\z)",
        r"(?is)(?:met.*?requirements?|compliant).*?(?:\n\s*\n|\z)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid section pattern"))
    .collect()
});

/// Normalize a document before it is sent to the summarizer.
pub fn preprocess(content: &str, config: &FlowConfig) -> String {
    if content.trim().is_empty() {
        return String::new();
    }

    let source = if config.extract_key_sections {
        extract_key_sections(content)
    } else {
        content.to_string()
    };

    let collapsed = collapse_whitespace(&source);
    truncate_with_marker(&collapsed, config.document_char_budget)
}

pub fn collapse_whitespace(content: &str) -> String {
    WHITESPACE.replace_all(content, " ").trim().to_string()
}

/// Pull out the paragraphs an inspection report uses to state findings.
/// Falls back to the whole content when no pattern matches.
pub fn extract_key_sections(content: &str) -> String {
    let sections: Vec<&str> = KEY_SECTIONS
        .iter()
        .flat_map(|pattern| pattern.find_iter(content))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();

    if sections.is_empty() {
        content.to_string()
    } else {
        sections.join("\n\n")
    }
}

/// Keep at most `budget` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn truncate_with_marker(text: &str, budget: usize) -> String {
    let kept = truncate_chars(text, budget);
    if kept.len() == text.len() {
        text.to_string()
    } else {
        format!("{}{}", kept, TRUNCATION_MARKER)
    }
}
