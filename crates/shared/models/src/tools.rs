use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a tool call is executed. Derived from a name prefix first, and only for
/// unrecognized prefixes does the tool catalog's per-role mapping decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Client,
    Server,
}

impl ExecutionKind {
    /// Applies the prefix rule from §3: `mcp_*` is always server, `client_*` is
    /// always client. Returns `None` when the name carries no recognized prefix,
    /// in which case the caller must fall back to the tool catalog.
    #[must_use]
    pub fn from_name_prefix(name: &str) -> Option<Self> {
        if name.starts_with("mcp_") {
            Some(Self::Server)
        } else if name.starts_with("client_") {
            Some(Self::Client)
        } else {
            None
        }
    }
}

/// Full description of a tool available to a role, as returned by the tool
/// catalog (`list_tools_for_role`) and translated by the bridge into each
/// provider's native tool schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub execution_kind: ExecutionKind,
}

/// A tool call's arguments, as emitted by a provider: either a JSON object or a
/// JSON-encoded string that the bridge parses into an object on ingress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Object(Value),
    Encoded(String),
}

impl ToolArguments {
    /// Normalizes to a `Value`, parsing an encoded string if necessary. Falls
    /// back to an empty object if the string does not parse as JSON, since a
    /// malformed argument string must not abort the whole turn.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Object(value) => value,
            Self::Encoded(raw) => serde_json::from_str(&raw).unwrap_or_else(|_| Value::Object(serde_json::Map::new())),
        }
    }
}

/// A single structured tool call as detected in (or synthesized from) a
/// provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCall {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments: ToolArguments::Object(arguments),
        }
    }

    /// Ensures this call carries an id, generating one when the provider omitted it.
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
    }

    #[must_use]
    pub fn execution_kind(&self, catalog_fallback: ExecutionKind) -> ExecutionKind {
        ExecutionKind::from_name_prefix(&self.name).unwrap_or(catalog_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rule_wins_over_catalog() {
        assert_eq!(ExecutionKind::from_name_prefix("mcp_weather_get"), Some(ExecutionKind::Server));
        assert_eq!(ExecutionKind::from_name_prefix("client_execute_shell"), Some(ExecutionKind::Client));
        assert_eq!(ExecutionKind::from_name_prefix("lookup_order"), None);
    }

    #[test]
    fn encoded_arguments_parse_to_object() {
        let args = ToolArguments::Encoded(r#"{"city":"nyc"}"#.to_string());
        assert_eq!(args.into_value(), serde_json::json!({"city": "nyc"}));
    }

    #[test]
    fn malformed_encoded_arguments_fall_back_to_empty_object() {
        let args = ToolArguments::Encoded("not json".to_string());
        assert_eq!(args.into_value(), serde_json::json!({}));
    }
}
