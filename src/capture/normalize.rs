use serde_json::Value;

use crate::models::Attribute;

/// Upper bound, in characters, for every stored string attribute.
pub const MAX_ATTRIBUTE_CHARS: usize = 255;

pub fn truncate(value: &str) -> String {
    match value.char_indices().nth(MAX_ATTRIBUTE_CHARS) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value.to_string(),
    }
}

pub fn truncate_owned(mut value: String) -> String {
    if let Some((cut, _)) = value.char_indices().nth(MAX_ATTRIBUTE_CHARS) {
        value.truncate(cut);
    }
    value
}

/// Collapse a raw parameter value into a stored attribute.
///
/// Scalars keep their type. Lists and keyed lists are reduced to their first
/// element as text.
pub fn normalize_value(value: Value) -> Option<Attribute> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(Attribute::Text(truncate_owned(text))),
        Value::Number(number) => Some(Attribute::Number(number)),
        Value::Bool(flag) => Some(Attribute::Bool(flag)),
        Value::Array(items) => Some(Attribute::Text(head_text(items.into_iter().next()))),
        Value::Object(entries) => Some(Attribute::Text(head_text(
            entries.into_iter().next().map(|(_, item)| item),
        ))),
    }
}

/// Text form of a list's first element: numbers print as written, `true` is
/// `"1"`, and `false`, null or a missing element are empty. Nested lists
/// descend to their own first element.
fn head_text(head: Option<Value>) -> String {
    match head {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::Bool(true)) => "1".to_string(),
        Some(Value::String(text)) => truncate_owned(text),
        Some(Value::Number(number)) => truncate_owned(number.to_string()),
        Some(Value::Array(items)) => head_text(items.into_iter().next()),
        Some(Value::Object(entries)) => head_text(entries.into_iter().next().map(|(_, item)| item)),
    }
}
