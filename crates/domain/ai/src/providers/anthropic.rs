use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{AiError, Result};

use super::sse::SseLineBuffer;
use super::{
    FileUploader, ModelLister, ProviderClient, RawStreamChunk, CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS,
    STREAM_CHANNEL_CAPACITY,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const FILES_BETA_HEADER: &str = "files-api-2025-04-14";

/// Anthropic driver (§4.C): `POST {base}/v1/messages` with `x-api-key` and
/// `anthropic-version`. A separate instance is constructed per resolved model
/// config, since `base_url` and the key vary per call.
#[derive(Debug)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    #[must_use]
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http, base_url, api_key }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn files_url(&self) -> String {
        format!("{}/v1/files", self.base_url.trim_end_matches('/'))
    }

    fn authed(&self, builder: reqwest::RequestBuilder, references_file_handle: bool) -> reqwest::RequestBuilder {
        let mut builder = builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        if references_file_handle {
            builder = builder.header("anthropic-beta", FILES_BETA_HEADER);
        }
        builder
    }
}

/// A request body references a file-by-handle when any content block carries
/// a Files-API `source.type == "file"`.
fn references_file_handle(body: &Value) -> bool {
    body.get("messages")
        .and_then(Value::as_array)
        .is_some_and(|messages| {
            messages.iter().any(|message| {
                message
                    .get("content")
                    .and_then(Value::as_array)
                    .is_some_and(|parts| {
                        parts
                            .iter()
                            .any(|part| part.get("source").and_then(|s| s.get("type")).and_then(Value::as_str) == Some("file"))
                    })
            })
        })
}

fn provider_error_from_body(status: reqwest::StatusCode, body: &Value) -> AiError {
    let message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("anthropic request failed")
        .to_string();
    let code = body.get("error").and_then(|e| e.get("type")).and_then(Value::as_str).map(str::to_string);

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AiError::Auth { provider: "anthropic".to_string() };
    }
    AiError::Provider {
        provider: "anthropic".to_string(),
        message,
        code,
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn complete(&self, body: Value) -> Result<Value> {
        let has_file_handle = references_file_handle(&body);
        let response = self
            .authed(self.http.post(self.messages_url()).json(&body), has_file_handle)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "anthropic".to_string(),
                message: source.to_string(),
                code: None,
            })?;

        let status = response.status();
        let json: Value = response.json().await.map_err(|source| AiError::Provider {
            provider: "anthropic".to_string(),
            message: source.to_string(),
            code: None,
        })?;

        if !status.is_success() {
            return Err(provider_error_from_body(status, &json));
        }
        Ok(json)
    }

    async fn stream(&self, mut body: Value) -> Result<mpsc::Receiver<Result<RawStreamChunk>>> {
        if let Some(object) = body.as_object_mut() {
            object.insert("stream".to_string(), Value::Bool(true));
        }
        let has_file_handle = references_file_handle(&body);

        let response = self
            .authed(self.http.post(self.messages_url()).json(&body), has_file_handle)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "anthropic".to_string(),
                message: source.to_string(),
                code: None,
            })?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::new();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(source) => {
                        let _ = tx
                            .send(Err(AiError::Provider {
                                provider: "anthropic".to_string(),
                                message: source.to_string(),
                                code: None,
                            }))
                            .await;
                        return;
                    },
                };

                for payload in lines.feed(&bytes) {
                    if payload == "[DONE]" {
                        let _ = tx.send(Ok(RawStreamChunk::Done)).await;
                        return;
                    }
                    match serde_json::from_str::<Value>(&payload) {
                        Ok(event) => {
                            if tx.send(Ok(RawStreamChunk::Event(event))).await.is_err() {
                                return;
                            }
                        },
                        Err(_) => continue,
                    }
                }
            }
            let _ = tx.send(Ok(RawStreamChunk::Done)).await;
        });

        Ok(rx)
    }
}

#[async_trait]
impl FileUploader for AnthropicClient {
    /// `POST {base}/v1/files`, multipart — Anthropic's separate upload
    /// endpoint returning a file handle (§4.C).
    async fn upload_file(&self, bytes: Vec<u8>, mime: &str, name: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(mime)
            .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new()));
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .authed(self.http.post(self.files_url()).multipart(form), false)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "anthropic".to_string(),
                message: source.to_string(),
                code: None,
            })?;

        let status = response.status();
        let json: Value = response.json().await.map_err(|source| AiError::Provider {
            provider: "anthropic".to_string(),
            message: source.to_string(),
            code: None,
        })?;

        if !status.is_success() {
            return Err(provider_error_from_body(status, &json));
        }

        json.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AiError::Format("anthropic upload response missing file id".to_string()))
    }
}

#[async_trait]
impl ModelLister for AnthropicClient {
    async fn list_models(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint);
        let response = self
            .authed(self.http.get(url), false)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "anthropic".to_string(),
                message: source.to_string(),
                code: None,
            })?;

        let status = response.status();
        let json: Value = response.json().await.map_err(|source| AiError::Provider {
            provider: "anthropic".to_string(),
            message: source.to_string(),
            code: None,
        })?;

        if !status.is_success() {
            return Err(provider_error_from_body(status, &json));
        }
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_file_handle_reference() {
        let body = serde_json::json!({
            "messages": [{"role": "user", "content": [{"type": "document", "source": {"type": "file", "file_id": "file_123"}}]}]
        });
        assert!(references_file_handle(&body));
    }

    #[test]
    fn plain_text_body_has_no_file_handle() {
        let body = serde_json::json!({"messages": [{"role": "user", "content": "hi"}]});
        assert!(!references_file_handle(&body));
    }
}
