use std::time::Duration;

use serde::{Deserialize, Serialize};
use systemprompt_identifiers::{ModelCode, RequestId, RoleName, UserId};
use systemprompt_models::Message;
use systemprompt_traits::DurableCache;

use crate::error::{AiError, Result};

pub const CONTEXT_TTL: Duration = Duration::from_secs(300);

/// Tool-call context (§3 "Tool-call context (ephemeral)"), written to the
/// durable cache keyed by request id when the orchestrator defers a
/// client-executed call to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallContext {
    pub initiator: UserId,
    pub model: ModelCode,
    pub role_name: RoleName,
    pub user_id: UserId,
    pub snapshot: Vec<Message>,
    pub assistant_message: Message,
}

#[must_use]
pub fn context_key(request_id: &RequestId) -> String {
    format!("tools_call_context:{request_id}")
}

pub async fn persist_context(cache: &dyn DurableCache, request_id: &RequestId, context: &ToolCallContext) -> Result<()> {
    let encoded = serde_json::to_string(context).map_err(|err| AiError::Format(err.to_string()))?;
    // A read-only-replica error is swallowed by the cache implementation itself
    // (§6 durable cache protocol); a genuine backend error still propagates.
    cache
        .set(&context_key(request_id), &encoded, Some(CONTEXT_TTL))
        .await
        .map_err(AiError::Other)
}

pub async fn load_context(cache: &dyn DurableCache, request_id: &RequestId) -> Result<Option<ToolCallContext>> {
    let Some(raw) = cache.get(&context_key(request_id)).await.map_err(AiError::Other)? else {
        return Ok(None);
    };
    let context = serde_json::from_str(&raw).map_err(|err| AiError::Format(err.to_string()))?;
    Ok(Some(context))
}

pub async fn delete_context(cache: &dyn DurableCache, request_id: &RequestId) {
    let _ = cache.delete(&context_key(request_id)).await;
}
