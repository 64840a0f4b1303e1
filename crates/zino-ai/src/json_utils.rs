//! Helpers for JSON values.

use serde_json::Value;

/// Merges the object `b` into `a` in place.
pub fn merge_inplace(a: &mut Value, b: Value) {
    if let (Value::Object(a_map), Value::Object(b_map)) = (a, b) {
        a_map.extend(b_map);
    }
}

/// Returns the first balanced `{...}` substring, if any.
/// Braces inside string literals are not counted.
///
/// Models frequently wrap JSON objects in prose or Markdown code fences.
pub fn find_json_substring(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the value as a JSON object. Strings are parsed as serialized JSON,
/// which is how some providers return function arguments.
pub fn parse_object(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(s) => match serde_json::from_str(&s) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}
