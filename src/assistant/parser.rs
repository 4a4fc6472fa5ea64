//! Pulls action objects out of free-form model output.
//!
//! The text may carry code fences and prose around the JSON. Objects are
//! found with a brace-depth scan, then each span goes through the typed
//! decode; spans that fail are dropped.

use tracing::debug;

use crate::assistant::action::ActionRecord;

pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// Top-level `{...}` spans in order of appearance. Braces inside string
/// literals are not special-cased. An unclosed span ends the scan.
pub fn extract_json_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        let mut depth = 0usize;
        let mut end = None;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }

        let Some(end) = end else { break };
        spans.push(&text[start..=end]);
        cursor = end + 1;
    }

    spans
}

pub fn parse_actions(raw: &str) -> Vec<ActionRecord> {
    let cleaned = strip_code_fences(raw);

    extract_json_objects(&cleaned)
        .into_iter()
        .filter_map(|span| match serde_json::from_str::<ActionRecord>(span) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "Discarding unrecognised JSON object");
                None
            }
        })
        .collect()
}
