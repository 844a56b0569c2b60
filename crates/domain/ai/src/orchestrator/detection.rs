use serde_json::Value;
use systemprompt_models::{Message, ToolCall};

const TEXT_FALLBACK_PREFIX: &str = "TOOL_CALL:";

/// Detects tool calls carried by an assistant message (§4.E detection):
/// structured calls first (already normalized onto `message.tool_calls` by
/// the format bridge regardless of which provider field they arrived in),
/// then a text-embedded `TOOL_CALL: {...}` line fallback.
#[must_use]
pub fn detect_tool_calls(message: &Message) -> Option<Vec<ToolCall>> {
    if let Some(calls) = &message.tool_calls {
        if !calls.is_empty() {
            return Some(calls.clone());
        }
    }

    let text = message.content.as_text()?;
    let calls: Vec<ToolCall> = text
        .lines()
        .filter_map(|line| line.strip_prefix(TEXT_FALLBACK_PREFIX))
        .filter_map(|json_part| serde_json::from_str::<Value>(json_part.trim()).ok())
        .map(|value| {
            let name = value.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let arguments = value.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()));
            ToolCall::new(name, arguments)
        })
        .collect();

    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use systemprompt_models::{MessageContent, MessageRole};

    #[test]
    fn falls_back_to_text_embedded_tool_call_line() {
        let message = Message {
            id: Some("m1".to_string()),
            role: MessageRole::Assistant,
            content: MessageContent::Text(
                "Let me look that up.\nTOOL_CALL: {\"name\": \"mcp_weather_get\", \"arguments\": {\"city\": \"nyc\"}}".to_string(),
            ),
            tool_calls: None,
            tool_call_id: None,
        };
        let calls = detect_tool_calls(&message).expect("detects fallback call");
        assert_eq!(calls[0].name, "mcp_weather_get");
    }

    #[test]
    fn structured_calls_take_priority_over_text() {
        let message = Message {
            id: Some("m1".to_string()),
            role: MessageRole::Assistant,
            content: MessageContent::Text("TOOL_CALL: {\"name\": \"ignored\"}".to_string()),
            tool_calls: Some(vec![ToolCall::new("mcp_real_call", serde_json::json!({}))]),
            tool_call_id: None,
        };
        let calls = detect_tool_calls(&message).expect("detects structured call");
        assert_eq!(calls[0].name, "mcp_real_call");
    }

    #[test]
    fn returns_none_when_no_call_present() {
        let message = Message::assistant("just an answer");
        assert!(detect_tool_calls(&message).is_none());
    }
}
