use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use systemprompt_models::{
    CanonicalResponse, Choice, FinishReason, Message, MessageContent, MessageRole, ToolArguments, ToolCall, Usage,
};

use crate::error::{AiError, Result};

/// Translates an Anthropic `/v1/messages` response body into the canonical
/// shape (§4.D response direction). Text blocks concatenate into `content`;
/// `tool_use` blocks become the canonical tool-calls array with
/// JSON-serialized arguments.
pub fn anthropic_to_canonical(body: &Value, request_model: &str) -> Result<CanonicalResponse> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| AiError::Format("anthropic response missing content array".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(part) = block.get("text").and_then(Value::as_str) {
                    text.push_str(part);
                }
            },
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let arguments = block.get("input").cloned().unwrap_or(Value::Object(serde_json::Map::new()));
                let mut call = ToolCall { id, name, arguments: ToolArguments::Object(arguments) };
                call.ensure_id();
                tool_calls.push(call);
            },
            _ => {},
        }
    }

    let stop_reason = body.get("stop_reason").and_then(Value::as_str);
    let finish_reason = if !tool_calls.is_empty() {
        FinishReason::ToolCalls
    } else {
        match stop_reason {
            Some("stop_sequence" | "end_turn") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    };

    let usage = body
        .get("usage")
        .map(|u| {
            let prompt = u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            let completion = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            Usage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: prompt + completion }
        })
        .unwrap_or_default();

    let message = Message {
        id: body.get("id").and_then(Value::as_str).map(str::to_string),
        role: MessageRole::Assistant,
        content: MessageContent::Text(text),
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
    };

    Ok(CanonicalResponse {
        id: body.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: request_model.to_string(),
        choices: vec![Choice { index: 0, message, finish_reason: Some(finish_reason) }],
        usage,
    })
}

/// Translates an OpenAI-compatible chat-completions response (§4.D response
/// direction): mostly a passthrough, with ids filled in and embedded fenced
/// JSON stripped when it duplicates already-structured tool calls.
pub fn openai_to_canonical(body: &Value) -> Result<CanonicalResponse> {
    let choices = body
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| AiError::Format("openai-compatible response missing choices array".to_string()))?;

    let first = choices
        .first()
        .ok_or_else(|| AiError::Format("openai-compatible response has no choices".to_string()))?;
    let message_value = first.get("message").cloned().unwrap_or(Value::Object(serde_json::Map::new()));

    let role = match message_value.get("role").and_then(Value::as_str) {
        Some("assistant") | None => MessageRole::Assistant,
        Some("tool") => MessageRole::Tool,
        Some("user") => MessageRole::User,
        _ => MessageRole::Assistant,
    };

    let tool_calls = parse_openai_tool_calls(&message_value);
    let mut content = message_value.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    if let Some(calls) = &tool_calls {
        content = strip_duplicated_fenced_json(&content, calls);
    }

    let mut message = Message {
        id: message_value.get("id").and_then(Value::as_str).map(str::to_string),
        role,
        content: MessageContent::Text(content),
        tool_calls,
        tool_call_id: None,
    };
    message.ensure_id();

    let finish_reason = match first.get("finish_reason").and_then(Value::as_str) {
        Some("stop") => Some(FinishReason::Stop),
        Some("length") => Some(FinishReason::Length),
        Some("tool_calls") => Some(FinishReason::ToolCalls),
        Some("content_filter") => Some(FinishReason::ContentFilter),
        _ if message.tool_calls.is_some() => Some(FinishReason::ToolCalls),
        _ => None,
    };

    let usage = body
        .get("usage")
        .map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        })
        .unwrap_or_default();

    Ok(CanonicalResponse {
        id: body.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        object: "chat.completion".to_string(),
        created: body.get("created").and_then(Value::as_i64).unwrap_or_else(|| chrono::Utc::now().timestamp()),
        model: body.get("model").and_then(Value::as_str).unwrap_or_default().to_string(),
        choices: vec![Choice { index: 0, message, finish_reason }],
        usage,
    })
}

/// Reassembles the equivalent of a unary Anthropic response body from a
/// decoded SSE event sequence (`message_start`/`content_block_start`/
/// `content_block_delta`/`message_delta`), so a streamed call can be handed
/// to [`anthropic_to_canonical`] exactly like a unary one once the stream
/// has been drained and auth-sniffed (§4.C).
#[must_use]
pub fn accumulate_anthropic_stream_body(events: &[Value]) -> Value {
    let mut id = String::new();
    let mut block_order = Vec::new();
    let mut text_blocks: BTreeMap<usize, String> = BTreeMap::new();
    let mut tool_blocks: BTreeMap<usize, (String, String, String)> = BTreeMap::new();
    let mut stop_reason: Option<String> = None;
    let mut input_tokens = 0u64;
    let mut output_tokens = 0u64;

    for event in events {
        match event.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                if let Some(message) = event.get("message") {
                    id = message.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    input_tokens = message
                        .get("usage")
                        .and_then(|usage| usage.get("input_tokens"))
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                }
            },
            Some("content_block_start") => {
                let index = event.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                let Some(block) = event.get("content_block") else { continue };
                block_order.push(index);
                if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                    let tool_id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    tool_blocks.insert(index, (tool_id, name, String::new()));
                } else {
                    text_blocks.insert(index, String::new());
                }
            },
            Some("content_block_delta") => {
                let index = event.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                let Some(delta) = event.get("delta") else { continue };
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(part) = delta.get("text").and_then(Value::as_str) {
                            text_blocks.entry(index).or_default().push_str(part);
                        }
                    },
                    Some("input_json_delta") => {
                        if let Some(part) = delta.get("partial_json").and_then(Value::as_str) {
                            if let Some(entry) = tool_blocks.get_mut(&index) {
                                entry.2.push_str(part);
                            }
                        }
                    },
                    _ => {},
                }
            },
            Some("message_delta") => {
                if let Some(reason) = event.get("delta").and_then(|delta| delta.get("stop_reason")).and_then(Value::as_str) {
                    stop_reason = Some(reason.to_string());
                }
                if let Some(tokens) = event.get("usage").and_then(|usage| usage.get("output_tokens")).and_then(Value::as_u64) {
                    output_tokens = tokens;
                }
            },
            _ => {},
        }
    }

    let content: Vec<Value> = block_order
        .into_iter()
        .map(|index| {
            if let Some((tool_id, name, partial_json)) = tool_blocks.get(&index) {
                let input = serde_json::from_str(partial_json).unwrap_or(Value::Object(serde_json::Map::new()));
                serde_json::json!({"type": "tool_use", "id": tool_id, "name": name, "input": input})
            } else {
                let text = text_blocks.get(&index).cloned().unwrap_or_default();
                serde_json::json!({"type": "text", "text": text})
            }
        })
        .collect();

    serde_json::json!({
        "id": id,
        "stop_reason": stop_reason,
        "content": content,
        "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens},
    })
}

/// Reassembles the equivalent of a unary OpenAI-compatible response body from
/// a decoded `chat.completion.chunk` sequence, mirroring
/// [`accumulate_anthropic_stream_body`] for the other driver family.
#[must_use]
pub fn accumulate_openai_stream_body(events: &[Value]) -> Value {
    let mut id = String::new();
    let mut model = String::new();
    let mut created = None;
    let mut content = String::new();
    let mut finish_reason = None;
    let mut tool_calls: BTreeMap<usize, (String, String, String)> = BTreeMap::new();
    let mut usage = None;

    for event in events {
        if id.is_empty() {
            id = event.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        }
        if model.is_empty() {
            model = event.get("model").and_then(Value::as_str).unwrap_or_default().to_string();
        }
        if created.is_none() {
            created = event.get("created").and_then(Value::as_i64);
        }
        if let Some(body_usage) = event.get("usage") {
            usage = Some(body_usage.clone());
        }

        let Some(choice) = event.get("choices").and_then(Value::as_array).and_then(|choices| choices.first()) else {
            continue;
        };
        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            finish_reason = Some(reason.to_string());
        }
        let Some(delta) = choice.get("delta") else { continue };
        if let Some(part) = delta.get("content").and_then(Value::as_str) {
            content.push_str(part);
        }
        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let index = call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                let entry = tool_calls.entry(index).or_default();
                if let Some(call_id) = call.get("id").and_then(Value::as_str) {
                    entry.0 = call_id.to_string();
                }
                if let Some(function) = call.get("function") {
                    if let Some(name) = function.get("name").and_then(Value::as_str) {
                        entry.1 = name.to_string();
                    }
                    if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                        entry.2.push_str(arguments);
                    }
                }
            }
        }
    }

    let tool_calls_value = (!tool_calls.is_empty()).then(|| {
        tool_calls
            .into_values()
            .map(|(call_id, name, arguments)| {
                serde_json::json!({"id": call_id, "type": "function", "function": {"name": name, "arguments": arguments}})
            })
            .collect::<Vec<_>>()
    });

    let mut message = serde_json::json!({"role": "assistant", "content": content});
    if let Some(calls) = tool_calls_value {
        message["tool_calls"] = Value::Array(calls);
    }

    serde_json::json!({
        "id": id,
        "object": "chat.completion",
        "created": created,
        "model": model,
        "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
        "usage": usage,
    })
}

fn parse_openai_tool_calls(message_value: &Value) -> Option<Vec<ToolCall>> {
    let raw = message_value.get("tool_calls")?.as_array()?;
    if raw.is_empty() {
        return None;
    }
    let calls = raw
        .iter()
        .map(|call| {
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let function = call.get("function").cloned().unwrap_or_default();
            let name = function.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let arguments = function
                .get("arguments")
                .and_then(Value::as_str)
                .map(|s| ToolArguments::Encoded(s.to_string()))
                .unwrap_or_else(|| ToolArguments::Object(function.get("arguments").cloned().unwrap_or(Value::Null)));
            let mut call = ToolCall { id, name, arguments };
            call.ensure_id();
            call
        })
        .collect();
    Some(calls)
}

/// Strips fenced ` ```json ... ``` ` blocks from `content` when they
/// duplicate an already-structured tool call by name, preventing the
/// orchestrator from executing the same call twice.
fn strip_duplicated_fenced_json(content: &str, calls: &[ToolCall]) -> String {
    let Ok(fence) = Regex::new(r"(?s)```json\s*(\{.*?\})\s*```") else { return content.to_string() };
    fence
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let block = &caps[1];
            let duplicates = serde_json::from_str::<Value>(block)
                .ok()
                .and_then(|parsed| parsed.get("name").and_then(Value::as_str).map(str::to_string))
                .is_some_and(|name| calls.iter().any(|call| call.name == name));
            if duplicates { String::new() } else { caps[0].to_string() }
        })
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_tool_use_becomes_canonical_tool_call() {
        let body = serde_json::json!({
            "id": "msg_1",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "checking weather"},
                {"type": "tool_use", "id": "call_1", "name": "mcp_weather_get", "input": {"city": "nyc"}},
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let response = anthropic_to_canonical(&body, "claude-3").expect("parses");
        let choice = response.choice0().expect("choice present");
        assert_eq!(choice.finish_reason, Some(FinishReason::ToolCalls));
        let calls = choice.message.tool_calls.as_ref().expect("has calls");
        assert_eq!(calls[0].name, "mcp_weather_get");
    }

    #[test]
    fn openai_strips_fenced_json_duplicating_structured_call() {
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Let me check.\n```json\n{\"name\":\"mcp_weather_get\",\"arguments\":{}}\n```",
                    "tool_calls": [{"id": "call_1", "function": {"name": "mcp_weather_get", "arguments": "{}"}}],
                },
                "finish_reason": "tool_calls",
            }],
        });
        let response = openai_to_canonical(&body).expect("parses");
        let content = response.choice0().expect("choice").message.content.as_text().expect("text");
        assert!(!content.contains("```json"));
    }
}
