//! Free-text parsers for model completions.
//!
//! Models wrap structured output in prose. Each extractor first tries a
//! strict parse of the whole completion, then falls back to the outermost
//! bracket pair. Anything that still fails to parse is `None`; callers own
//! the fallback.

use serde_json::Value;

/// Extracts a JSON object from `text`: strict parse first, then the
/// substring between the first `{` and the last `}`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    extract_delimited(text, '{', '}').filter(Value::is_object)
}

/// Extracts a JSON array from `text`: strict parse first, then the
/// substring between the first `[` and the last `]`.
pub fn extract_json_array(text: &str) -> Option<Value> {
    extract_delimited(text, '[', ']').filter(|v| v.is_array())
}

fn extract_delimited(text: &str, open: char, close: char) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Sections parsed out of a hunt-execution completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HuntSections {
    pub summary: String,
    pub actions: Vec<String>,
}

/// Parses the `SUMMARY:` / `ACTIONS:` marker format.
///
/// The summary is everything between the markers; each subsequent line
/// starting with `-` is one action, with the dash and surrounding
/// whitespace trimmed. Absent markers leave the fields empty.
pub fn parse_hunt_sections(text: &str) -> HuntSections {
    let mut sections = HuntSections::default();

    let Some(summary_pos) = text.find("SUMMARY:") else {
        return sections;
    };
    let summary_start = summary_pos + "SUMMARY:".len();
    let actions_pos = text.find("ACTIONS:");

    let summary_end = actions_pos.unwrap_or(text.len());
    if summary_end > summary_start {
        sections.summary = text[summary_start..summary_end].trim().to_string();
    }

    if let Some(pos) = actions_pos {
        let actions_text = &text[pos + "ACTIONS:".len()..];
        sections.actions = actions_text
            .lines()
            .filter(|line| line.trim_start().starts_with('-'))
            .map(|line| line.trim().trim_start_matches('-').trim().to_string())
            .collect();
    }

    sections
}
