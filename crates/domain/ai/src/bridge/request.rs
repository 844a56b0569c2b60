use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use systemprompt_identifiers::{ProviderKind, RoleName, UserId};
use systemprompt_models::{
    CanonicalRequest, ContentPart, Message, MessageContent, MessageRole, ModelConfig, ToolDescriptor,
};
use systemprompt_traits::{FileService, SystemPromptStore};

use crate::error::{AiError, Result};
use crate::feeder::{self, Chunk};
use crate::providers::FileUploader;

const CONTINUE_PROMPT: &str = "请继续";
const UPLOADABLE_MIME_PREFIXES: [&str; 2] = ["image/", "text/"];
const UPLOADABLE_MIME_EXACT: &str = "application/pdf";

/// The provider-ready request assembled by the format bridge (§4.D request
/// direction): a wire body plus the normalized canonical message list kept
/// around for the orchestrator's splicing and re-invocation logic, and any
/// oversized-file chunks the content walk registered with the feeder.
pub struct PreparedRequest {
    pub body: Value,
    pub messages: Vec<Message>,
    pub pending_file_chunks: Vec<Chunk>,
}

pub struct FormatBridge<'a> {
    pub prompt_store: &'a dyn SystemPromptStore,
    pub file_service: &'a dyn FileService,
    pub uploader: Option<&'a dyn FileUploader>,
}

impl<'a> FormatBridge<'a> {
    #[must_use]
    pub fn new(
        prompt_store: &'a dyn SystemPromptStore,
        file_service: &'a dyn FileService,
        uploader: Option<&'a dyn FileUploader>,
    ) -> Self {
        Self { prompt_store, file_service, uploader }
    }

    /// Builds the provider-native request for `request` against `model`,
    /// running the full canonical→provider pipeline from §4.D.
    pub async fn build_request(
        &self,
        request: &CanonicalRequest,
        model: &ModelConfig,
        tools: &[ToolDescriptor],
    ) -> Result<PreparedRequest> {
        let role_name = RoleName::new(request.effective_role_name().to_string());
        let user_id = request.user_id.as_ref().map(|u| UserId::new(u.clone()));

        let mut messages = request.messages.clone();

        let composed_system = self.compose_system_prompt(&role_name, user_id.as_ref()).await?;
        drop_inbound_system_messages(&mut messages);
        messages.insert(0, Message::system(composed_system));

        apply_message_list_invariants(&mut messages);
        systemprompt_models::message::ensure_message_ids(&mut messages);

        let mut pending_file_chunks = Vec::new();
        let mut wire_messages = Vec::with_capacity(messages.len());
        for message in &messages {
            let (content, chunks) = self
                .resolve_message_content(message, model.provider_kind, user_id.as_ref())
                .await?;
            pending_file_chunks.extend(chunks);
            wire_messages.push(wire_message(message, content));
        }

        let body = match model.provider_kind {
            ProviderKind::Anthropic => self.build_anthropic_body(request, model, &wire_messages, tools)?,
            ProviderKind::OpenAiCompatible => self.build_openai_body(request, &wire_messages, tools)?,
        };

        Ok(PreparedRequest { body, messages, pending_file_chunks })
    }

    /// Rebuilds a provider-native body from an already-normalized message
    /// list (system composition and the trailing-assistant/empty-content
    /// invariants already applied) without re-running them a second time.
    /// Used by the orchestrator to re-invoke the model once server-tool
    /// results have been spliced into the conversation (§4.E).
    pub async fn build_body_for_messages(
        &self,
        messages: &[Message],
        model: &ModelConfig,
        request: &CanonicalRequest,
        tools: &[ToolDescriptor],
    ) -> Result<Value> {
        let mut wire_messages = Vec::with_capacity(messages.len());
        for message in messages {
            let (content, _chunks) = self.resolve_message_content(message, model.provider_kind, None).await?;
            wire_messages.push(wire_message(message, content));
        }

        match model.provider_kind {
            ProviderKind::Anthropic => self.build_anthropic_body(request, model, &wire_messages, tools),
            ProviderKind::OpenAiCompatible => self.build_openai_body(request, &wire_messages, tools),
        }
    }

    async fn compose_system_prompt(&self, role_name: &RoleName, user_id: Option<&UserId>) -> Result<String> {
        let excluded = matches!(role_name.as_str(), "general_assistant" | "title_generator");
        let mut sections = Vec::new();

        if !excluded {
            if let Some(general) = self
                .prompt_store
                .get(&RoleName::new("general_assistant"))
                .await
                .map_err(AiError::Other)?
            {
                sections.push(general);
            }
        }

        sections.push(format!("Current time: {}", Utc::now().format("%Y-%m-%d %H:%M:%S")));

        if let Some(role_prompt) = self.prompt_store.get(role_name).await.map_err(AiError::Other)? {
            sections.push(role_prompt);
        }

        if role_name.as_str().starts_with("storagebox") {
            if let Some(user_id) = user_id {
                sections.push(format!("Caller user_id: {user_id}"));
            }
        }

        Ok(sections.join("\n\n"))
    }

    async fn resolve_message_content(
        &self,
        message: &Message,
        provider_kind: ProviderKind,
        user_id: Option<&UserId>,
    ) -> Result<(Value, Vec<Chunk>)> {
        match &message.content {
            MessageContent::Text(text) => Ok((Value::String(text.clone()), Vec::new())),
            MessageContent::Parts(parts) => {
                let mut resolved = Vec::with_capacity(parts.len());
                let mut chunks = Vec::new();
                for part in parts {
                    let (value, part_chunks) = self.resolve_part(part, user_id).await?;
                    resolved.push(value);
                    chunks.extend(part_chunks);
                }

                if provider_kind == ProviderKind::OpenAiCompatible {
                    Ok((Value::String(collapse_parts_to_text(&resolved)), chunks))
                } else {
                    Ok((Value::Array(resolved), chunks))
                }
            },
        }
    }

    async fn resolve_part(&self, part: &ContentPart, user_id: Option<&UserId>) -> Result<(Value, Vec<Chunk>)> {
        match part {
            ContentPart::Text { text } => Ok((json!({"type": "text", "text": text}), Vec::new())),
            ContentPart::FileRead { file_id, md5 } => self.resolve_file_read(file_id, md5.as_deref(), user_id).await,
            ContentPart::Image { url, mime_type } => Ok((resolve_image(url, mime_type.as_deref()), Vec::new())),
            ContentPart::Document { url, mime_type } => Ok((
                json!({"type": "document", "url": url, "mime_type": mime_type}),
                Vec::new(),
            )),
        }
    }

    async fn resolve_file_read(
        &self,
        file_id: &str,
        expected_md5: Option<&str>,
        user_id: Option<&UserId>,
    ) -> Result<(Value, Vec<Chunk>)> {
        let user_id = user_id.cloned().unwrap_or_else(|| UserId::new(String::new()));
        let downloaded = self
            .file_service
            .download(file_id, &user_id)
            .await
            .map_err(AiError::Other)?;

        if let Some(expected) = expected_md5 {
            let actual = format!("{:x}", md5::compute(&downloaded.bytes));
            if actual != expected {
                return Err(AiError::FileIntegrity {
                    file_id: file_id.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let can_upload_handle = self.uploader.is_some() && is_handle_eligible_mime(&downloaded.mime_type);
        if can_upload_handle {
            if let Some(uploader) = self.uploader {
                let handle = uploader
                    .upload_file(downloaded.bytes.clone(), &downloaded.mime_type, file_id)
                    .await?;
                return Ok((
                    json!({"type": "document", "source": {"type": "file", "file_id": handle}}),
                    Vec::new(),
                ));
            }
        }

        // Text extracted from a file may itself be oversized (§4.F trigger b).
        if downloaded.mime_type.starts_with("text/") {
            let text = String::from_utf8_lossy(&downloaded.bytes).into_owned();
            if let Some(chunks) = feeder::split_file_text(file_id, &text) {
                let inline = chunks[0].content.clone();
                return Ok((json!({"type": "text", "text": inline}), chunks));
            }
            return Ok((json!({"type": "text", "text": text}), Vec::new()));
        }

        let encoded = BASE64.encode(&downloaded.bytes);
        Ok((
            json!({"type": "image", "source": {"type": "base64", "media_type": downloaded.mime_type, "data": encoded}}),
            Vec::new(),
        ))
    }

    fn build_anthropic_body(
        &self,
        request: &CanonicalRequest,
        model: &ModelConfig,
        wire_messages: &[Value],
        tools: &[ToolDescriptor],
    ) -> Result<Value> {
        let (system, rest) = split_system_message(wire_messages);
        let mut body = json!({
            "model": model_name_for(request),
            "system": system,
            "messages": rest,
            "max_tokens": request.max_tokens.unwrap_or(model.max_tokens_hint.unwrap_or(4096)),
        });

        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.parameters}))
                .collect::<Vec<_>>());
        }

        if let Some(thinking) = request.thinking() {
            let budget = thinking.budget_tokens.unwrap_or(1024);
            let max_tokens = body["max_tokens"].as_u64().unwrap_or(4096) as u32;
            let max_tokens = if max_tokens > budget { max_tokens } else { budget + 1000 };
            body["max_tokens"] = json!(max_tokens);
            body["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
            body["temperature"] = json!(1.0);
            if let Some(object) = body.as_object_mut() {
                object.remove("top_p");
            }
        } else {
            let sampling = request.sampling();
            if let Some(temperature) = sampling.temperature {
                body["temperature"] = json!(temperature);
            }
            if let Some(top_p) = sampling.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        Ok(body)
    }

    fn build_openai_body(&self, request: &CanonicalRequest, wire_messages: &[Value], tools: &[ToolDescriptor]) -> Result<Value> {
        let sampling = request.sampling();
        let mut body = json!({
            "model": model_name_for(request),
            "messages": wire_messages,
            "stream": request.stream,
        });
        if let Some(temperature) = sampling.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = sampling.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {"name": t.name, "description": t.description, "parameters": t.parameters},
                }))
                .collect::<Vec<_>>());
            body["tool_choice"] = json!("auto");
        }
        Ok(body)
    }
}

fn model_name_for(request: &CanonicalRequest) -> &str {
    &request.model
}

fn is_handle_eligible_mime(mime: &str) -> bool {
    mime == UPLOADABLE_MIME_EXACT || UPLOADABLE_MIME_PREFIXES.iter().any(|prefix| mime.starts_with(prefix))
}

fn resolve_image(url: &str, mime_type: Option<&str>) -> Value {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((header, data)) = rest.split_once(",") {
            let mime = header.split(';').next().unwrap_or("application/octet-stream");
            return json!({"type": "image", "source": {"type": "base64", "media_type": mime, "data": data}});
        }
    }
    json!({"type": "image", "url": url, "mime_type": mime_type})
}

fn collapse_parts_to_text(parts: &[Value]) -> String {
    parts
        .iter()
        .map(|part| match part.get("type").and_then(Value::as_str) {
            Some("text") => part.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
            Some(other) => format!("[{other}]"),
            None => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn wire_message(message: &Message, content: Value) -> Value {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };
    let mut value = json!({"role": role, "content": content});
    if let Some(id) = &message.id {
        value["id"] = json!(id);
    }
    if let Some(tool_calls) = &message.tool_calls {
        value["tool_calls"] = json!(tool_calls
            .iter()
            .map(|call| json!({
                "id": call.id,
                "type": "function",
                "function": {"name": call.name, "arguments": serde_json::to_string(&call.arguments.clone().into_value()).unwrap_or_default()},
            }))
            .collect::<Vec<_>>());
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        value["tool_call_id"] = json!(tool_call_id);
    }
    value
}

fn split_system_message(wire_messages: &[Value]) -> (Value, Vec<Value>) {
    let mut system = Value::String(String::new());
    let mut rest = Vec::with_capacity(wire_messages.len());
    for message in wire_messages {
        if message.get("role").and_then(Value::as_str) == Some("system") {
            system = message.get("content").cloned().unwrap_or(Value::String(String::new()));
        } else {
            rest.push(message.clone());
        }
    }
    (system, rest)
}

fn drop_inbound_system_messages(messages: &mut Vec<Message>) {
    messages.retain(|message| !matches!(message.role, MessageRole::System));
}

/// Enforces the final message-list invariants (§4.D step 6): the list never
/// ends with an assistant message, never carries two consecutive assistant
/// messages, and no message is left with empty content.
fn apply_message_list_invariants(messages: &mut Vec<Message>) {
    let mut deduped: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages.drain(..) {
        if message.is_assistant() && deduped.last().is_some_and(Message::is_assistant) {
            continue;
        }
        deduped.push(message);
    }

    for message in &mut deduped {
        if message.content.is_empty() {
            message.content = MessageContent::Text("(no content)".to_string());
        }
    }

    if deduped.last().is_some_and(Message::is_assistant) {
        deduped.push(Message::user(CONTINUE_PROMPT));
    }

    *messages = deduped;
}

#[cfg(test)]
mod tests {
    use super::*;
    use systemprompt_models::MessageRole;

    #[test]
    fn drops_consecutive_assistant_messages() {
        let mut messages = vec![
            Message::user("hi"),
            Message::assistant("first"),
            Message::assistant("second"),
        ];
        apply_message_list_invariants(&mut messages);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content.as_text(), Some("first"));
    }

    #[test]
    fn appends_continue_prompt_when_trailing_assistant() {
        let mut messages = vec![Message::user("hi"), Message::assistant("done")];
        apply_message_list_invariants(&mut messages);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages.last().expect("present").role, MessageRole::User);
        assert_eq!(messages.last().expect("present").content.as_text(), Some(CONTINUE_PROMPT));
    }

    #[test]
    fn fills_empty_content_with_neutral_filler() {
        let mut messages = vec![Message::user("")];
        apply_message_list_invariants(&mut messages);
        assert_eq!(messages[0].content.as_text(), Some("(no content)"));
    }
}
