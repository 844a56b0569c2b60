use serde_json::{json, Value};

/// Normalizes a provider's list-models response into
/// `{object: "list", data: [...]}` (§4.D). Accepts `{object: "list", data:
/// [...]}`, `{data: {models: [...]}}`, `{models: [...]}`, or any
/// single array-valued top-level field, synthesizing missing `id`,
/// `object: "model"`, `created` and `owned_by` on each entry.
#[must_use]
pub fn normalize_model_list(raw: &Value, owned_by: &str) -> Value {
    let entries = extract_entries(raw);
    let data = entries
        .into_iter()
        .filter_map(|entry| normalize_entry(entry, owned_by))
        .collect::<Vec<_>>();
    json!({"object": "list", "data": data})
}

fn extract_entries(raw: &Value) -> Vec<Value> {
    if let Some(array) = raw.get("data").and_then(Value::as_array) {
        return array.clone();
    }
    if let Some(array) = raw.get("data").and_then(|d| d.get("models")).and_then(Value::as_array) {
        return array.clone();
    }
    if let Some(array) = raw.get("models").and_then(Value::as_array) {
        return array.clone();
    }
    if let Value::Object(map) = raw {
        for value in map.values() {
            if let Some(array) = value.as_array() {
                return array.clone();
            }
        }
    }
    if let Value::Array(array) = raw {
        return array.clone();
    }
    Vec::new()
}

fn normalize_entry(entry: Value, owned_by: &str) -> Option<Value> {
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| entry.get("name").and_then(Value::as_str))
        .or_else(|| entry.get("model").and_then(Value::as_str))?
        .to_string();
    if id.trim().is_empty() {
        return None;
    }

    let created = entry.get("created").and_then(Value::as_i64).unwrap_or_else(|| chrono::Utc::now().timestamp());
    let resolved_owner = entry.get("owned_by").and_then(Value::as_str).unwrap_or(owned_by).to_string();

    Some(json!({
        "id": id,
        "object": "model",
        "created": created,
        "owned_by": resolved_owner,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_models_array_shape() {
        let raw = json!({"models": [{"name": "deepseek-chat"}]});
        let normalized = normalize_model_list(&raw, "deepseek");
        assert_eq!(normalized["object"], "list");
        assert_eq!(normalized["data"][0]["id"], "deepseek-chat");
        assert_eq!(normalized["data"][0]["object"], "model");
    }

    #[test]
    fn normalizes_nested_data_models_shape() {
        let raw = json!({"data": {"models": [{"id": "claude-3"}]}});
        let normalized = normalize_model_list(&raw, "anthropic");
        assert_eq!(normalized["data"][0]["id"], "claude-3");
    }

    #[test]
    fn every_entry_satisfies_testable_property_seven() {
        let raw = json!([{"id": "m1"}, {"name": "m2"}]);
        let normalized = normalize_model_list(&raw, "owner");
        let data = normalized["data"].as_array().expect("array");
        for entry in data {
            assert_eq!(entry["object"], "model");
            assert!(entry["id"].as_str().is_some_and(|id| !id.is_empty()));
        }
    }
}
