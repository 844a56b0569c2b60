use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{AiError, Result};

use super::{RawStreamChunk, STREAM_CHANNEL_CAPACITY};

/// Does this decoded stream event carry an HTTP-401-equivalent error? Covers
/// both the OpenAI-compatible shape (`error.code == 401`) and Anthropic's
/// (`type == "error"`, `error.type == "authentication_error"`), and also
/// matches the chunk this module itself synthesizes, so a caller that
/// accumulates a sniffed stream back into a single body can recognize the
/// terminal auth chunk without duplicating the detection rule.
pub fn is_auth_error(event: &Value) -> bool {
    let Some(error) = event.get("error") else { return false };

    let code_is_401 = match error.get("code") {
        Some(Value::Number(n)) => n.as_i64() == Some(401),
        Some(Value::String(s)) => s == "401",
        _ => false,
    };
    let type_is_auth = error
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t == "authentication_error" || t == "invalid_api_key");

    code_is_401 || type_is_auth
}

fn synthesized_auth_chunk(provider: &str) -> Value {
    serde_json::json!({
        "error": {
            "message": format!("Authentication failed with provider {provider}; try switching models."),
            "type": "authentication_error",
            "code": "invalid_api_key",
        }
    })
}

/// Wraps a raw provider stream (§4.C): sniffs each decoded chunk, and on the
/// first HTTP-401-equivalent error, replaces the rest of the stream with a
/// single synthesized `authentication_error` chunk and closes the channel.
#[must_use]
pub fn wrap_with_auth_sniff(
    mut upstream: mpsc::Receiver<Result<RawStreamChunk>>,
    provider: String,
) -> mpsc::Receiver<Result<RawStreamChunk>> {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(item) = upstream.recv().await {
            match item {
                Ok(RawStreamChunk::Event(event)) if is_auth_error(&event) => {
                    let _ = tx
                        .send(Ok(RawStreamChunk::Event(synthesized_auth_chunk(&provider))))
                        .await;
                    let _ = tx.send(Ok(RawStreamChunk::Done)).await;
                    return;
                },
                other => {
                    if tx.send(other).await.is_err() {
                        return;
                    }
                },
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_single_synthesized_chunk_then_done_on_401() {
        let (upstream_tx, upstream_rx) = mpsc::channel(4);
        upstream_tx
            .send(Ok(RawStreamChunk::Event(serde_json::json!({"error": {"code": 401, "message": "invalid api key"}}))))
            .await
            .expect("send");
        upstream_tx
            .send(Ok(RawStreamChunk::Event(serde_json::json!({"choices": []}))))
            .await
            .expect("send");
        drop(upstream_tx);

        let mut rx = wrap_with_auth_sniff(upstream_rx, "deepseek".to_string());
        let first = rx.recv().await.expect("chunk").expect("ok");
        match first {
            RawStreamChunk::Event(value) => {
                assert_eq!(value["error"]["type"], "authentication_error");
                assert_eq!(value["error"]["code"], "invalid_api_key");
            },
            RawStreamChunk::Done => panic!("expected synthesized event first"),
        }
        let second = rx.recv().await.expect("chunk").expect("ok");
        assert!(matches!(second, RawStreamChunk::Done));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn passes_through_non_auth_events_unchanged() {
        let (upstream_tx, upstream_rx) = mpsc::channel(4);
        upstream_tx
            .send(Ok(RawStreamChunk::Event(serde_json::json!({"choices": [{"delta": {"content": "hi"}}]}))))
            .await
            .expect("send");
        upstream_tx.send(Ok(RawStreamChunk::Done)).await.expect("send");
        drop(upstream_tx);

        let mut rx = wrap_with_auth_sniff(upstream_rx, "deepseek".to_string());
        let first = rx.recv().await.expect("chunk").expect("ok");
        assert!(matches!(first, RawStreamChunk::Event(_)));
        let second = rx.recv().await.expect("chunk").expect("ok");
        assert!(matches!(second, RawStreamChunk::Done));
    }
}
