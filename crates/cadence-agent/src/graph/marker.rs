//! Decision markers written by executors.
//!
//! The line-oriented shape is
//!
//! ```text
//! ROUTING: <ACTION> - <LABEL>: <payload>
//! ```
//!
//! e.g. `ROUTING: SEARCH - SEARCH: population of Seattle`. Text without a
//! marker is not an error; the router falls back instead.

use std::sync::OnceLock;

use regex::Regex;

const MARKER_PATTERN: &str = r"(?i)ROUTING:\s*([A-Za-z_]+)";
const LABEL_PATTERN: &str = r"^[A-Z][A-Z_]*:\s*";
const MATH_RUN_PATTERN: &str = r"[\d+\-*/().%\s]+";

fn marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).ok()).as_ref()
}

fn label_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LABEL_PATTERN).ok()).as_ref()
}

fn math_run_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MATH_RUN_PATTERN).ok()).as_ref()
}

/// A parsed `ROUTING:` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Action name, uppercased.
    pub action: String,
    /// Text after ` - `, with a leading `LABEL:` removed. Single line.
    pub payload: Option<String>,
}

/// Find the first `ROUTING:` marker in `text`.
pub fn parse_decision(text: &str) -> Option<Decision> {
    let caps = marker_regex()?.captures(text)?;
    let action = caps.get(1)?;
    let rest = text[action.end()..].lines().next().unwrap_or("");

    let payload = rest
        .trim_start()
        .strip_prefix('-')
        .map(str::trim)
        .map(|p| match label_regex() {
            Some(re) => re.replace(p, "").trim().to_string(),
            None => p.to_string(),
        })
        .filter(|p| !p.is_empty());

    Some(Decision {
        action: action.as_str().to_uppercase(),
        payload,
    })
}

/// Text on the same line after the first label found, trying `labels`
/// in order. Labels match case-sensitively (`"SEARCH:"`).
pub fn extract_payload(text: &str, labels: &[&str]) -> Option<String> {
    labels.iter().find_map(|label| {
        let start = text.find(label)? + label.len();
        let line = text[start..].trim_start().lines().next().unwrap_or("").trim();
        (!line.is_empty()).then(|| line.to_string())
    })
}

/// Everything after the first occurrence of `label`, across lines.
pub fn extract_section<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.find(label)
        .map(|i| text[i + label.len()..].trim())
        .filter(|s| !s.is_empty())
}

/// The longest run of arithmetic characters in free text.
pub fn longest_math_run(text: &str) -> Option<String> {
    math_run_regex()?
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(|c| c.is_ascii_digit()))
        .max_by_key(|s| s.len())
        .map(str::to_string)
}
