use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use systemprompt_config::{McpServerConfig, McpTransportKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, Result};
use crate::wire::{JsonRpcRequest, JsonRpcResponse, McpToolDescriptor, ToolsListResult};

/// A single upstream SSE event as delivered to the tool orchestrator.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub data: Value,
}

/// One client per configured server (§4.G); held for the process lifetime by
/// [`McpManager`] once created. Connection-pooled like the provider HTTP
/// client in `systemprompt-ai`.
#[derive(Debug)]
pub struct McpClient {
    server: McpServerConfig,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl McpClient {
    #[must_use]
    pub fn new(server: McpServerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            server,
            http,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.server.effective_token()))
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let response = self
            .authed(self.http.post(&self.server.url).json(&request))
            .send()
            .await
            .map_err(|source| McpError::Transport {
                server: self.server.name.clone(),
                source,
            })?;
        let bytes = response.bytes().await.map_err(|source| McpError::Transport {
            server: self.server.name.clone(),
            source,
        })?;
        let parsed: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|err| McpError::MalformedResponse(self.server.name.clone(), err))?;

        if let Some(error) = parsed.error {
            return Err(McpError::RpcError {
                server: self.server.name.clone(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// `tools/call` (§4.G): `{name, arguments}` params, `Authorization`
    /// header set whenever the server config carries a token.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.rpc_call("tools/call", serde_json::json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// `tools/list` (§4.G), returning `[{name, description, parameters}]`.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>> {
        let result = self.rpc_call("tools/list", serde_json::json!({})).await?;
        let parsed: ToolsListResult = serde_json::from_value(result)
            .map_err(|err| McpError::MalformedResponse(self.server.name.clone(), err))?;
        Ok(parsed.tools)
    }

    /// Opens a long-lived SSE connection for servers declared `transport:
    /// "sse"` and returns a response channel plus an error channel (§4.G).
    /// Dropping or cancelling `cancel` closes both; the producer task that
    /// decodes `data: <json>` lines exits as soon as either the stream ends
    /// or cancellation fires.
    pub fn connect_sse(
        &self,
        cancel: CancellationToken,
    ) -> Result<(mpsc::Receiver<SseEvent>, mpsc::Receiver<McpError>)> {
        if self.server.transport != McpTransportKind::Sse {
            return Err(McpError::NotSseTransport {
                server: self.server.name.clone(),
            });
        }

        let (data_tx, data_rx) = mpsc::channel(32);
        let (err_tx, err_rx) = mpsc::channel(4);

        let http = self.http.clone();
        let server = self.server.clone();

        tokio::spawn(async move {
            let request = http
                .get(&server.url)
                .header("Authorization", format!("Bearer {}", server.effective_token()))
                .header("Accept", "text/event-stream");

            let response = match request.send().await {
                Ok(response) => response,
                Err(source) => {
                    let _ = err_tx
                        .send(McpError::Transport {
                            server: server.name.clone(),
                            source,
                        })
                        .await;
                    return;
                },
            };

            let mut byte_stream = response.bytes_stream();
            let mut buffer = Vec::new();

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    chunk = byte_stream.next() => {
                        let Some(chunk) = chunk else {
                            let _ = err_tx
                                .send(McpError::StreamClosed { server: server.name.clone() })
                                .await;
                            break;
                        };
                        let chunk = match chunk {
                            Ok(chunk) => chunk,
                            Err(source) => {
                                let _ = err_tx
                                    .send(McpError::Transport { server: server.name.clone(), source })
                                    .await;
                                break;
                            },
                        };
                        buffer.extend_from_slice(&chunk);
                        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                            let line = buffer.drain(..=pos).collect::<Vec<u8>>();
                            let line = String::from_utf8_lossy(&line);
                            let line = line.trim_end();
                            let Some(payload) = line.strip_prefix("data:") else { continue };
                            let payload = payload.trim();
                            if payload.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<Value>(payload) {
                                Ok(data) => {
                                    if data_tx.send(SseEvent { data }).await.is_err() {
                                        return;
                                    }
                                },
                                Err(err) => {
                                    let _ = err_tx
                                        .send(McpError::MalformedResponse(server.name.clone(), err))
                                        .await;
                                },
                            }
                        }
                    }
                }
            }
        });

        Ok((data_rx, err_rx))
    }
}
