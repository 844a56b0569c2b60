use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use systemprompt_ai::bridge::FormatBridge;
use systemprompt_ai::feeder::{Chunk, ChunkInvoker, PayloadFeeder};
use systemprompt_ai::orchestrator::context::ToolCallContext;
use systemprompt_ai::providers::anthropic::AnthropicClient;
use systemprompt_ai::providers::openai_compatible::OpenAiCompatibleClient;
use systemprompt_ai::providers::ProviderClient;
use systemprompt_ai::{ClientExecutorResult, TurnInvoker, ToolOrchestrator, TurnOutcome};
use systemprompt_identifiers::{ApiKeyId, ModelCode, ProviderKind, RequestId, RoleName, UserId};
use systemprompt_models::{CanonicalRequest, ModelConfig};

use crate::auth::{classify, ApiKeyKind};
use crate::error::{AppError, Result};
use crate::invoker::GatewayTurnInvoker;
use crate::state::{uploader_for, AppState};

/// Inbound body for `POST /v1/chat/completions`: either a fresh canonical
/// request, or the caller resuming a deferred client-executed tool call
/// (§4.E resumption; distinguished by the presence of `result`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatRequestBody {
    Resume(ResumePayload),
    Completion(Box<CanonicalRequest>),
}

#[derive(Debug, Deserialize)]
struct ResumePayload {
    tool_call_id: String,
    result: String,
    session_id: String,
}

pub async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ChatRequestBody>) -> Result<Response> {
    let presented_key = extract_bearer(&headers)?;

    match body {
        ChatRequestBody::Completion(request) => run_completion(&state, &presented_key, *request).await,
        ChatRequestBody::Resume(payload) => run_resume(&state, payload).await,
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or(AppError::MissingApiKey)
}

async fn run_completion(state: &AppState, presented_key: &str, request: CanonicalRequest) -> Result<Response> {
    let kind = classify(presented_key);
    let model = state.registry.resolve(&request.model).await?;
    let user_id = UserId::new(request.user_id.clone().unwrap_or_else(|| "anonymous".to_string()));
    let role_name = RoleName::new(request.effective_role_name().to_string());

    let (secret, key_id) = resolve_upstream_secret(state, kind, presented_key, &model.model_code, &user_id).await?;

    let uploader = uploader_for(model.provider_kind, &model.base_url, &secret);
    let bridge = FormatBridge::new(state.prompt_store.as_ref(), state.file_service.as_ref(), uploader.as_deref());

    let tools = state
        .tool_catalog
        .list_tools_for_role(&role_name)
        .await
        .map_err(AppError::Other)?;

    let prepared = bridge.build_request(&request, &model, &tools).await?;

    let request_id = RequestId::new_chat(&user_id, now_nanos());
    let client = build_client(&model, &secret);
    let invoker = GatewayTurnInvoker {
        bridge: &bridge,
        model: &model,
        request: &request,
        client: client.as_ref(),
        key_router: &state.key_router,
        key_id: key_id.as_ref(),
    };

    let outcome = if let Some(chunks) = chunks_to_feed(&prepared.pending_file_chunks) {
        let adapter = FeederAdapter { invoker: &invoker };
        let content = PayloadFeeder::feed(&chunks, &adapter, &prepared.messages).await?;
        TurnOutcome::Final { content, think: None }
    } else {
        let orchestrator = ToolOrchestrator::new(&state.mcp, state.cache.as_ref(), state.tool_catalog.as_ref());
        orchestrator
            .run(&invoker, &request_id, &model.model_code, &role_name, &user_id, prepared.messages, &tools)
            .await?
    };

    if kind.uses_platform_credit() {
        if let TurnOutcome::Final { content, .. } = &outcome {
            deduct_estimated_usage(state, &user_id, content).await;
        }
    }

    Ok(if request.stream {
        stream_outcome(outcome, &request.model).into_response()
    } else {
        Json(unary_body(outcome, &request.model)).into_response()
    })
}

/// Resumes a deferred client-executed call (§4.E). The caller must echo the
/// `session_id` it was handed on the deferral response.
async fn run_resume(state: &AppState, payload: ResumePayload) -> Result<Response> {
    let session_id = RequestId::new(payload.session_id.clone());
    let raw = state
        .cache
        .get(&format!("tools_call_context:{session_id}"))
        .await
        .map_err(AppError::Other)?
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("no pending tool-call context for session {session_id}")))?;
    let context: ToolCallContext = serde_json::from_str(&raw).map_err(|err| AppError::Other(err.into()))?;

    let model = state.registry.resolve(context.model.as_str()).await?;
    let key = state.key_router.get_next(&model.model_code).await?;
    let uploader = uploader_for(model.provider_kind, &model.base_url, key.trimmed_secret());
    let bridge = FormatBridge::new(state.prompt_store.as_ref(), state.file_service.as_ref(), uploader.as_deref());
    let client = build_client(&model, key.trimmed_secret());

    let dummy_request = CanonicalRequest {
        model: model.model_code.to_string(),
        messages: Vec::new(),
        temperature: None,
        top_p: None,
        max_tokens: None,
        stream: false,
        tools: None,
        user_id: None,
        role_name: Some(context.role_name.to_string()),
        thinking_enabled: None,
        thinking_budget: None,
    };
    let invoker = GatewayTurnInvoker {
        bridge: &bridge,
        model: &model,
        request: &dummy_request,
        client: client.as_ref(),
        key_router: &state.key_router,
        key_id: Some(&key.id),
    };

    let resume_payload = ClientExecutorResult {
        session_id: Some(session_id.clone()),
        tool_call_id: payload.tool_call_id,
        result: payload.result,
    };

    let orchestrator = ToolOrchestrator::new(&state.mcp, state.cache.as_ref(), state.tool_catalog.as_ref());
    let outcome = orchestrator.resume(&invoker, &session_id, &resume_payload).await?;
    Ok(Json(unary_body(outcome, &model.model_code.to_string())).into_response())
}

async fn resolve_upstream_secret(
    state: &AppState,
    kind: ApiKeyKind,
    presented_key: &str,
    model_code: &ModelCode,
    user_id: &UserId,
) -> Result<(String, Option<ApiKeyId>)> {
    match kind {
        ApiKeyKind::Platform => {
            let (allowed, _balance) = state
                .credit_ledger
                .verify_and_check_tokens(user_id)
                .await
                .map_err(AppError::Other)?;
            if !allowed {
                return Err(AppError::InsufficientCredit);
            }
            let key = state.key_router.get_next(model_code).await?;
            Ok((key.trimmed_secret().to_string(), Some(key.id.clone())))
        },
        ApiKeyKind::PassthroughAnthropic | ApiKeyKind::PassthroughOpenAiCompatible => {
            Ok((presented_key.to_string(), None))
        },
    }
}

async fn deduct_estimated_usage(state: &AppState, user_id: &UserId, content: &str) {
    // No per-turn usage totals survive the tool-orchestration loop (it only
    // returns final text); approximate at 4 chars/token.
    let estimated_tokens = (content.chars().count() as u64 / 4).max(1);
    if let Err(err) = state.credit_ledger.deduct_tokens(user_id, estimated_tokens).await {
        tracing::warn!(error = %err, "credit deduction failed after a request was already served");
    }
}

/// Chunks past index 1 (already inlined by the format bridge) that still
/// need to be fed through the model (§4.F trigger b).
fn chunks_to_feed(pending: &[Chunk]) -> Option<Vec<Chunk>> {
    let remainder: Vec<Chunk> = pending.iter().filter(|chunk| chunk.index > 1).cloned().collect();
    if remainder.is_empty() { None } else { Some(remainder) }
}

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}

fn build_client(model: &ModelConfig, secret: &str) -> Box<dyn ProviderClient> {
    match model.provider_kind {
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(model.base_url.clone(), secret.to_string())),
        ProviderKind::OpenAiCompatible => {
            Box::new(OpenAiCompatibleClient::new(&model.base_url, &model.chat_endpoint, secret.to_string()))
        },
    }
}

fn unary_body(outcome: TurnOutcome, model: &str) -> Value {
    match outcome {
        TurnOutcome::Final { content, think } => {
            let mut message = json!({"role": "assistant", "content": content});
            if let Some(think) = think {
                message["think"] = json!(think);
            }
            json!({
                "object": "chat.completion",
                "model": model,
                "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
            })
        },
        TurnOutcome::ClientExecutorCall { session_id, calls } => json!({
            "object": "chat.completion",
            "model": model,
            "session_id": session_id.to_string(),
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": Value::Null,
                    "tool_calls": calls.iter().map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.arguments.clone().into_value()},
                    })).collect::<Vec<_>>(),
                },
                "finish_reason": "tool_calls",
            }],
        }),
    }
}

/// `GatewayTurnInvoker` already drove the real provider stream (and
/// auth-sniffed it) to produce `outcome`; the orchestrator's tool loop still
/// only returns a complete final message per turn, so this outward-facing
/// SSE framing emits it as a single content delta followed by the
/// terminating chunk rather than token-level incremental deltas.
fn stream_outcome(outcome: TurnOutcome, model: &str) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let model = model.to_string();
    let events = match outcome {
        TurnOutcome::Final { content, .. } => vec![
            json!({"object": "chat.completion.chunk", "model": model, "choices": [{"index": 0, "delta": {"role": "assistant", "content": content}, "finish_reason": Value::Null}]}),
            json!({"object": "chat.completion.chunk", "model": model, "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
        ],
        TurnOutcome::ClientExecutorCall { session_id, calls } => vec![json!({
            "object": "chat.completion.chunk",
            "model": model,
            "session_id": session_id.to_string(),
            "choices": [{
                "index": 0,
                "delta": {"tool_calls": calls.iter().map(|c| json!({"id": c.id, "function": {"name": c.name}})).collect::<Vec<_>>()},
                "finish_reason": "tool_calls",
            }],
        })],
    };

    let stream = stream::iter(events.into_iter().map(|value| Ok(Event::default().data(value.to_string()))));
    Sse::new(stream)
}

struct FeederAdapter<'a> {
    invoker: &'a GatewayTurnInvoker<'a>,
}

#[async_trait]
impl ChunkInvoker for FeederAdapter<'_> {
    async fn invoke(&self, messages: Vec<systemprompt_models::Message>) -> systemprompt_ai::Result<String> {
        let response = self.invoker.invoke(&messages, &[]).await?;
        Ok(response.choice0().and_then(|c| c.message.content.as_text()).unwrap_or_default().to_string())
    }
}
