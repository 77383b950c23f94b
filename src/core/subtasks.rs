//! Parsing of decomposition payloads into subtask descriptions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*])\s+(.+)$").expect("valid bullet regex"));

/// Extract subtask descriptions from a Decompose payload.
///
/// Accepts three shapes, in order of preference:
/// - a JSON array of strings,
/// - an object with a `subtasks` array,
/// - free-form text with numbered or bulleted lines.
///
/// Returns an empty list when nothing usable is found; the caller treats
/// that as a failed mutation rather than silently dropping the decision.
pub fn parse_subtasks(payload: &Value) -> Vec<String> {
    match payload {
        Value::Array(items) => from_array(items),
        Value::Object(map) => map
            .get("subtasks")
            .map(|value| parse_subtasks(value))
            .unwrap_or_default(),
        Value::String(text) => from_text(text),
        _ => Vec::new(),
    }
}

/// Optional `max_attempts` override carried in an object payload.
pub fn subtask_max_attempts(payload: &Value) -> Option<u32> {
    payload
        .get("max_attempts")
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|&value| value >= 1)
}

fn from_array(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn from_text(text: &str) -> Vec<String> {
    let mut subtasks = Vec::new();
    for line in text.lines() {
        let Some(captures) = BULLET.captures(line) else {
            continue;
        };
        let body = captures[1].trim();
        // "Step name: description" lines keep only the description.
        let description = match body.split_once(':') {
            Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
            _ => body,
        };
        if !description.is_empty() {
            subtasks.push(description.to_string());
        }
    }
    subtasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbered_list() {
        let payload = json!("1. write the parser\n2) add tests\n3. wire the CLI");
        assert_eq!(
            parse_subtasks(&payload),
            vec!["write the parser", "add tests", "wire the CLI"]
        );
    }

    #[test]
    fn parses_bulleted_list_with_labels() {
        let payload = json!("- setup: create the module\n* implement the codec\nprose is ignored");
        assert_eq!(
            parse_subtasks(&payload),
            vec!["create the module", "implement the codec"]
        );
    }

    #[test]
    fn parses_json_array_and_object_forms() {
        assert_eq!(
            parse_subtasks(&json!(["one", " two ", ""])),
            vec!["one", "two"]
        );
        let payload = json!({"subtasks": ["a", "b"], "max_attempts": 4});
        assert_eq!(parse_subtasks(&payload), vec!["a", "b"]);
        assert_eq!(subtask_max_attempts(&payload), Some(4));
    }

    #[test]
    fn degrades_to_empty_on_unusable_payloads() {
        assert!(parse_subtasks(&json!(null)).is_empty());
        assert!(parse_subtasks(&json!("no list markers here")).is_empty());
        assert!(parse_subtasks(&json!(42)).is_empty());
        assert_eq!(subtask_max_attempts(&json!({"max_attempts": 0})), None);
    }
}
