pub mod anthropic;
pub mod auth_sniff;
pub mod openai_compatible;
pub mod sse;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// One decoded upstream stream event (§4.C): either a provider event JSON or
/// the `[DONE]` sentinel.
#[derive(Debug, Clone)]
pub enum RawStreamChunk {
    Event(Value),
    Done,
}

/// Shared contract for the two driver families (§4.C). `complete` returns the
/// raw provider JSON body; translation to the canonical shape happens one
/// layer up in `bridge::response`. `stream` hands back the consumer end of a
/// single-slot channel (§5 backpressure) fed by a dedicated producer task.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn complete(&self, body: Value) -> Result<Value>;

    async fn stream(&self, body: Value) -> Result<mpsc::Receiver<Result<RawStreamChunk>>>;
}

/// Anthropic's separate multipart `/v1/files` upload endpoint (§4.C); also
/// the seam the format bridge uses when a model config's upload capability is
/// configured for another provider family.
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload_file(&self, bytes: Vec<u8>, mime: &str, name: &str) -> Result<String>;
}

/// Fetches the raw provider model-list response from `model_list_endpoint`
/// (§4.C, consumed by the catalog synchronizer in §4.H). Returns the body
/// untouched; normalizing it into the gateway's list shape happens one layer
/// up in `bridge::model_list`.
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(&self, endpoint: &str) -> Result<Value>;
}

pub(crate) const STREAM_CHANNEL_CAPACITY: usize = 1;
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 300;
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 30;
