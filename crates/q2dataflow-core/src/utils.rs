//! String helpers shared by the converters and renderers

// External imports (alphabetized)
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Normalize a plugin or action id so `-` and `_` compare equal
pub fn normalize_id(id: &str) -> String {
    id.replace('-', "_")
}

/// Replace everything that is not legal in an identifier with `_`
pub fn to_identifier(s: &str) -> String {
    NON_IDENTIFIER.replace_all(s, "_").into_owned()
}

/// Render a JSON value as the plain string a string-typed declaration carries.
///
/// Strings are returned unquoted and booleans in lower case.
pub fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Stringify a value, or every element of it when it is an array
pub fn stringify_elements(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|v| JsonValue::String(stringify(v))).collect())
        }
        JsonValue::Null => JsonValue::Null,
        other => JsonValue::String(stringify(other)),
    }
}
