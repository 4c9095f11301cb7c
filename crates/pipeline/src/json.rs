//! Pulling a JSON object out of free-form model output.

use std::sync::LazyLock;

use regex::Regex;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").expect("valid regex"));

/// The JSON object in `text`: the body of a fenced block if present,
/// otherwise the span from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(captures) = FENCE_RE.captures(text) {
        return captures.get(1).map(|m| m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
