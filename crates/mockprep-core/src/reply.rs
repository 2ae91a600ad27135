//! Lenient readers for JSON-mode model replies.

use serde_json::{Map, Value};

use crate::ScoringError;

/// Parses a reply into a JSON object, unwrapping a Markdown code fence if the
/// model added one.
pub(crate) fn parse_object(text: &str) -> Result<Map<String, Value>, ScoringError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(ScoringError::EmptyReply);
    }
    match serde_json::from_str::<Value>(body).map_err(ScoringError::NotJson)? {
        Value::Object(map) => Ok(map),
        _ => Err(ScoringError::NotAnObject),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string (`json`) on the opening line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Numeric field; absent or null reads as `default`. Numeric strings are
/// accepted, anything else is an error.
pub(crate) fn number_field(
    obj: &Map<String, Value>,
    field: &str,
    default: f64,
) -> Result<f64, ScoringError> {
    let invalid = |value: &Value| ScoringError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    };
    match obj.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(&Value::Number(n.clone()))),
        Some(value @ Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}

pub(crate) fn string_field(obj: &Map<String, Value>, field: &str) -> String {
    match obj.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// String list; a bare string becomes a one-item list, non-string items are
/// dropped.
pub(crate) fn string_list(obj: &Map<String, Value>, field: &str) -> Vec<String> {
    match obj.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
