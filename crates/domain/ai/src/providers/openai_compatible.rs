use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{AiError, Result};

use super::sse::SseLineBuffer;
use super::{
    ModelLister, ProviderClient, RawStreamChunk, CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS, STREAM_CHANNEL_CAPACITY,
};

/// OpenAI-compatible driver (§4.C): `POST {base}{endpoint}` with Bearer auth.
/// Covers DeepSeek and any other chat-completions-shaped backend.
#[derive(Debug)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    url: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    #[must_use]
    pub fn new(base_url: &str, endpoint: &str, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint);
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), url, api_key }
    }
}

fn provider_error_from_body(status: reqwest::StatusCode, body: &Value) -> AiError {
    let message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("provider request failed")
        .to_string();
    let code = body
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AiError::Auth { provider: "openai_compatible".to_string() };
    }
    AiError::Provider {
        provider: "openai_compatible".to_string(),
        message,
        code,
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    async fn complete(&self, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "openai_compatible".to_string(),
                message: source.to_string(),
                code: None,
            })?;

        let status = response.status();
        let json: Value = response.json().await.map_err(|source| AiError::Provider {
            provider: "openai_compatible".to_string(),
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

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "openai_compatible".to_string(),
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
                                provider: "openai_compatible".to_string(),
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
impl ModelLister for OpenAiCompatibleClient {
    async fn list_models(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| AiError::Provider {
                provider: "openai_compatible".to_string(),
                message: source.to_string(),
                code: None,
            })?;

        let status = response.status();
        let json: Value = response.json().await.map_err(|source| AiError::Provider {
            provider: "openai_compatible".to_string(),
            message: source.to_string(),
            code: None,
        })?;

        if !status.is_success() {
            return Err(provider_error_from_body(status, &json));
        }
        Ok(json)
    }
}
