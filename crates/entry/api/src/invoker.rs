use async_trait::async_trait;
use systemprompt_ai::bridge::{
    accumulate_anthropic_stream_body, accumulate_openai_stream_body, anthropic_to_canonical, openai_to_canonical, FormatBridge,
};
use systemprompt_ai::providers::auth_sniff::{is_auth_error, wrap_with_auth_sniff};
use systemprompt_ai::providers::{ProviderClient, RawStreamChunk};
use systemprompt_ai::{AiError, Result, TurnInvoker};
use systemprompt_identifiers::{ApiKeyId, ProviderKind};
use systemprompt_models::{CanonicalRequest, CanonicalResponse, Message, ModelConfig, ToolDescriptor};
use systemprompt_registry::KeyRouter;

/// Re-invokes the resolved provider through the format bridge and a single
/// concrete [`ProviderClient`], reporting success/failure on the key that
/// served the call (§4.B per-request health writeback) after every turn.
pub struct GatewayTurnInvoker<'a> {
    pub bridge: &'a FormatBridge<'a>,
    pub model: &'a ModelConfig,
    pub request: &'a CanonicalRequest,
    pub client: &'a dyn ProviderClient,
    pub key_router: &'a KeyRouter,
    /// `None` for a caller-supplied passthrough key (§6): there is no pool
    /// record to update, so health reporting is skipped entirely.
    pub key_id: Option<&'a ApiKeyId>,
}

impl GatewayTurnInvoker<'_> {
    /// Drives the real streaming driver (§4.C) instead of the unary one when
    /// the inbound request asked for `stream: true`, wrapping the channel in
    /// [`wrap_with_auth_sniff`] so a mid-stream 401-equivalent (§8 Testable
    /// Scenario #2) surfaces as an [`AiError::Auth`] instead of being
    /// silently absorbed. The drained, auth-sniffed event sequence is
    /// reassembled into the same unary body shape `complete()` would have
    /// returned, so every caller downstream of this method — tool detection
    /// included — sees one consistent shape regardless of which driver path
    /// served the turn.
    async fn invoke_via_stream(&self, body: serde_json::Value) -> Result<serde_json::Value> {
        let provider = self.model.provider_kind.as_str().to_string();
        let raw = self.client.stream(body).await?;
        let mut sniffed = wrap_with_auth_sniff(raw, provider.clone());

        let mut events = Vec::new();
        while let Some(item) = sniffed.recv().await {
            match item? {
                RawStreamChunk::Event(event) if is_auth_error(&event) => {
                    return Err(AiError::Auth { provider });
                },
                RawStreamChunk::Event(event) => events.push(event),
                RawStreamChunk::Done => break,
            }
        }

        Ok(match self.model.provider_kind {
            ProviderKind::Anthropic => accumulate_anthropic_stream_body(&events),
            ProviderKind::OpenAiCompatible => accumulate_openai_stream_body(&events),
        })
    }
}

#[async_trait]
impl TurnInvoker for GatewayTurnInvoker<'_> {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<CanonicalResponse> {
        let body = self
            .bridge
            .build_body_for_messages(messages, self.model, self.request, tools)
            .await?;

        let outcome = if self.request.stream {
            self.invoke_via_stream(body).await
        } else {
            self.client.complete(body).await
        };
        if let Some(key_id) = self.key_id {
            let report_result = match &outcome {
                Ok(_) => self.key_router.report(&self.model.model_code, key_id, true, None).await,
                Err(err) => self.key_router.report(&self.model.model_code, key_id, false, Some(&err.to_string())).await,
            };
            if let Err(err) = report_result {
                tracing::warn!(error = %err, "failed to record key health after invocation");
            }
        }

        let body = outcome?;
        match self.model.provider_kind {
            ProviderKind::Anthropic => anthropic_to_canonical(&body, &self.request.model),
            ProviderKind::OpenAiCompatible => openai_to_canonical(&body),
        }
    }
}
