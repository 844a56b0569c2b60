use std::time::Duration;

use async_trait::async_trait;
use systemprompt_models::Message;

use crate::error::{AiError, Result};

pub const CHUNK_SIZE: usize = 100_000;
pub const FILE_INLINE_TRIGGER: usize = 150_000;
const MAX_ATTEMPTS: u32 = 3;

/// Which oversized payload a chunk belongs to (§4.F: "tool_name | file_id").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSource {
    Tool(String),
    File(String),
}

/// A single slice of an oversized payload (§3 "Large-file chunk descriptor",
/// generalized to cover oversized tool results too).
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    pub is_last: bool,
    pub source: ChunkSource,
    pub content: String,
}

/// Re-invokes the model with the running message list and returns its reply
/// text. Implemented by the orchestrator so the feeder stays provider-agnostic.
#[async_trait]
pub trait ChunkInvoker: Send + Sync {
    async fn invoke(&self, messages: Vec<Message>) -> Result<String>;
}

/// Splits `text` into fixed `CHUNK_SIZE`-character slices (trigger (a): an
/// oversized server-tool result).
#[must_use]
pub fn chunk_text(source: ChunkSource, text: &str) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![Chunk {
            index: 1,
            total: 1,
            is_last: true,
            source,
            content: String::new(),
        }];
    }
    let total = chars.len().div_ceil(CHUNK_SIZE);
    chars
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, slice)| Chunk {
            index: i + 1,
            total,
            is_last: i + 1 == total,
            source: source.clone(),
            content: slice.iter().collect(),
        })
        .collect()
}

/// Trigger (b): a file body whose extracted text exceeds
/// [`FILE_INLINE_TRIGGER`] characters. The first [`CHUNK_SIZE`] characters are
/// embedded inline as chunk 1; the remainder is sliced into ordered chunks.
/// Returns `None` when the text is short enough to embed whole.
#[must_use]
pub fn split_file_text(file_id: &str, text: &str) -> Option<Vec<Chunk>> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= FILE_INLINE_TRIGGER {
        return None;
    }

    let (first, rest) = chars.split_at(CHUNK_SIZE);
    let first_slice: String = first.iter().collect();
    let remainder: String = rest.iter().collect();
    let remainder_chunks = chunk_text(ChunkSource::File(file_id.to_string()), &remainder);
    let total = 1 + remainder_chunks.len();

    let mut chunks = Vec::with_capacity(total);
    chunks.push(Chunk {
        index: 1,
        total,
        is_last: total == 1,
        source: ChunkSource::File(file_id.to_string()),
        content: first_slice,
    });
    for (offset, mut chunk) in remainder_chunks.into_iter().enumerate() {
        chunk.index = offset + 2;
        chunk.total = total;
        chunk.is_last = chunk.index == total;
        chunks.push(chunk);
    }
    Some(chunks)
}

fn frame_chunk(chunk: &Chunk) -> String {
    let label = match &chunk.source {
        ChunkSource::Tool(name) => format!("tool `{name}`"),
        ChunkSource::File(file_id) => format!("file `{file_id}`"),
    };
    if chunk.is_last {
        format!(
            "All batches delivered for {label} ({}/{}). Answer the user's original question now.\n\n{}",
            chunk.index, chunk.total, chunk.content
        )
    } else {
        format!(
            "This is batch {}/{} of {label}. Wait for all batches before answering.\n\n{}",
            chunk.index, chunk.total, chunk.content
        )
    }
}

/// Feeds a sequence of chunks to the model one at a time, acknowledging each
/// non-final chunk and returning the model's answer to the final one (§4.F
/// feeding dialogue).
pub struct PayloadFeeder;

impl PayloadFeeder {
    /// Runs the feeding dialogue over `chunks`, starting from `base_messages`.
    /// Each chunk invocation retries up to [`MAX_ATTEMPTS`] times with linear
    /// backoff (1s, 2s). A chunk that exhausts its retries is recorded as
    /// failed but does not stop the remaining chunks from being attempted
    /// (best-effort); [`AiError::BudgetExceeded`] is raised only after every
    /// chunk has been tried.
    pub async fn feed(
        chunks: &[Chunk],
        invoker: &dyn ChunkInvoker,
        base_messages: &[Message],
    ) -> Result<String> {
        let mut messages = base_messages.to_vec();
        let mut failed_index = None;
        let mut final_content = String::new();

        for chunk in chunks {
            messages.push(Message::user(frame_chunk(chunk)));

            match Self::invoke_with_retry(invoker, &messages).await {
                Some(reply) => {
                    if chunk.is_last {
                        final_content = reply;
                    } else {
                        messages.push(Message::assistant(reply));
                    }
                },
                None => {
                    failed_index.get_or_insert(chunk.index);
                },
            }
        }

        if let Some(index) = failed_index {
            return Err(AiError::BudgetExceeded {
                index,
                total: chunks.len(),
            });
        }
        Ok(final_content)
    }

    async fn invoke_with_retry(invoker: &dyn ChunkInvoker, messages: &[Message]) -> Option<String> {
        for attempt in 0..MAX_ATTEMPTS {
            match invoker.invoke(messages.to_vec()).await {
                Ok(reply) => return Some(reply),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "chunk invocation failed");
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt) + 1)).await;
                    }
                },
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_splits_on_fixed_boundaries() {
        let text = "a".repeat(250_000);
        let chunks = chunk_text(ChunkSource::Tool("mcp_search".to_string()), &text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.len(), 100_000);
        assert_eq!(chunks[2].content.len(), 50_000);
        assert!(chunks[2].is_last);
        assert!(!chunks[0].is_last);
    }

    #[test]
    fn split_file_text_below_threshold_returns_none() {
        let text = "a".repeat(150_000);
        assert!(split_file_text("file1", &text).is_none());
    }

    #[test]
    fn split_file_text_matches_testable_property_three() {
        // 270,000 chars: inline first slice (100k) + remainder 170k -> ceil(170000/100000)=2
        let text = "a".repeat(270_000);
        let chunks = split_file_text("file1", &text).expect("exceeds threshold");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[0].content.len(), 100_000);
        assert!(chunks.last().expect("non-empty").is_last);
        assert_eq!(chunks.iter().filter(|c| c.is_last).count(), 1);
    }

    struct AlwaysFails;

    #[async_trait]
    impl ChunkInvoker for AlwaysFails {
        async fn invoke(&self, _messages: Vec<Message>) -> Result<String> {
            Err(AiError::Format("boom".to_string()))
        }
    }

    struct Echo;

    #[async_trait]
    impl ChunkInvoker for Echo {
        async fn invoke(&self, messages: Vec<Message>) -> Result<String> {
            Ok(format!("ack-{}", messages.len()))
        }
    }

    #[tokio::test]
    async fn feed_returns_budget_exceeded_when_a_chunk_exhausts_retries() {
        let chunks = chunk_text(ChunkSource::Tool("mcp_search".to_string()), &"x".repeat(150_000));
        let err = PayloadFeeder::feed(&chunks, &AlwaysFails, &[])
            .await
            .expect_err("must fail");
        assert!(matches!(err, AiError::BudgetExceeded { .. }));
    }

    #[tokio::test]
    async fn feed_returns_final_reply_on_success() {
        let chunks = chunk_text(ChunkSource::Tool("mcp_search".to_string()), &"x".repeat(150_000));
        let reply = PayloadFeeder::feed(&chunks, &Echo, &[]).await.expect("succeeds");
        assert!(reply.starts_with("ack-"));
    }
}
