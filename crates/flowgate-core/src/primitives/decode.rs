use serde_json::Value;

/// Decodes a stored id list, accepting both `["a","b"]` and the
/// double-encoded form `"[\"a\",\"b\"]"`. Numeric elements become their
/// decimal text, so `[101, 102]` reads as `["101", "102"]`.
///
/// Never fails: blank, `null`, or undecodable input yields an empty list.
pub fn decode_id_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(value) => ids_from_value(value).unwrap_or_else(|| {
                tracing::warn!(json = raw, "double-encoded id list is not a list of ids");
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!(json = raw, error = %e, "failed to decode double-encoded id list");
                Vec::new()
            }
        },
        Ok(value) => ids_from_value(value).unwrap_or_else(|| {
            tracing::warn!(json = raw, "id list is not a list of ids");
            Vec::new()
        }),
        Err(e) => {
            tracing::warn!(json = raw, error = %e, "failed to decode id list");
            Vec::new()
        }
    }
}

// `None` when the value is not `null` or an array of strings and numbers.
fn ids_from_value(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
