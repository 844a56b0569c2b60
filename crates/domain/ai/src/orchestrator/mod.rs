pub mod context;
pub mod detection;
pub mod think;

use async_trait::async_trait;
use systemprompt_identifiers::{ModelCode, RequestId, RoleName, UserId};
use systemprompt_mcp::McpManager;
use systemprompt_models::{CanonicalResponse, Message, ToolCall, ToolDescriptor};
use systemprompt_traits::{DurableCache, ToolCatalog};

use crate::error::{AiError, Result};
use crate::feeder::{self, ChunkInvoker, ChunkSource, PayloadFeeder};

use context::{delete_context, load_context, persist_context, ToolCallContext};
use detection::detect_tool_calls;
use think::strip_think_region;

const ITERATION_CAP: usize = 5;

/// Re-invokes 4.C for a turn: rebuilds the provider request from `messages`
/// (attaching `tools`, or none to suppress re-advertising) and returns the
/// canonical response. Implemented by the entry layer, which owns the
/// already-resolved model config, API key and format-bridge collaborators.
#[async_trait]
pub trait TurnInvoker: Send + Sync {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<CanonicalResponse>;
}

/// A caller-delivered `client_executor_result` payload resuming a deferred
/// client-executed call (§4.E client execution, resumption).
pub struct ClientExecutorResult {
    pub session_id: Option<RequestId>,
    pub tool_call_id: String,
    pub result: String,
}

/// Outcome of one orchestrated turn.
pub enum TurnOutcome {
    /// The loop terminated with natural-language content (tool calls
    /// exhausted or the iteration cap was reached).
    Final { content: String, think: Option<String> },
    /// The loop deferred to the caller: persist this under `session_id` and
    /// resume later via [`ToolOrchestrator::resume`].
    ClientExecutorCall { session_id: RequestId, calls: Vec<ToolCall> },
}

pub struct ToolOrchestrator<'a> {
    mcp: &'a McpManager,
    cache: &'a dyn DurableCache,
    catalog: &'a dyn ToolCatalog,
}

impl<'a> ToolOrchestrator<'a> {
    #[must_use]
    pub fn new(mcp: &'a McpManager, cache: &'a dyn DurableCache, catalog: &'a dyn ToolCatalog) -> Self {
        Self { mcp, cache, catalog }
    }

    /// Runs a fresh turn starting from `initial_messages` (§4.E).
    pub async fn run(
        &self,
        invoker: &dyn TurnInvoker,
        request_id: &RequestId,
        model_code: &ModelCode,
        role_name: &RoleName,
        user_id: &UserId,
        initial_messages: Vec<Message>,
        tools: &[ToolDescriptor],
    ) -> Result<TurnOutcome> {
        self.loop_turns(invoker, request_id, model_code, role_name, user_id, initial_messages, tools)
            .await
    }

    /// Resumes a turn from a persisted tool-call context after the caller
    /// delivers a `client_executor_result` (§4.E client execution).
    pub async fn resume(
        &self,
        invoker: &dyn TurnInvoker,
        incoming_request_id: &RequestId,
        payload: &ClientExecutorResult,
    ) -> Result<TurnOutcome> {
        let session_id = payload
            .session_id
            .clone()
            .or_else(|| incoming_request_id.derive_chat_from_cer())
            .ok_or_else(|| AiError::Format("cannot resolve tool-call-context session id".to_string()))?;

        let context: ToolCallContext = load_context(self.cache, &session_id)
            .await?
            .ok_or_else(|| AiError::Format(format!("no tool-call context for session {session_id}")))?;
        delete_context(self.cache, &session_id).await;

        let mut messages = context.snapshot.clone();
        messages.push(context.assistant_message.clone());
        messages.push(Message::tool_result(payload.tool_call_id.clone(), payload.result.clone()));

        self.loop_turns(
            invoker,
            &session_id,
            &context.model,
            &context.role_name,
            &context.user_id,
            messages,
            &[],
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn loop_turns(
        &self,
        invoker: &dyn TurnInvoker,
        request_id: &RequestId,
        model_code: &ModelCode,
        role_name: &RoleName,
        user_id: &UserId,
        mut messages: Vec<Message>,
        initial_tools: &[ToolDescriptor],
    ) -> Result<TurnOutcome> {
        let mut tools_for_next = initial_tools.to_vec();
        let empty_tools: Vec<ToolDescriptor> = Vec::new();

        for _iteration in 0..ITERATION_CAP {
            let response = invoker.invoke(&messages, &tools_for_next).await?;
            let choice = response
                .choice0()
                .ok_or_else(|| AiError::Format("provider response carried no choices".to_string()))?;
            let assistant_message = choice.message.clone();

            let Some(calls) = detect_tool_calls(&assistant_message) else {
                return Ok(finalize(&assistant_message));
            };

            let (server_calls, client_calls) = self.split_by_execution_kind(role_name, calls).await?;

            if !client_calls.is_empty() {
                let context = ToolCallContext {
                    initiator: user_id.clone(),
                    model: model_code.clone(),
                    role_name: role_name.clone(),
                    user_id: user_id.clone(),
                    snapshot: messages.clone(),
                    assistant_message: assistant_message.clone(),
                };
                persist_context(self.cache, request_id, &context).await?;
                return Ok(TurnOutcome::ClientExecutorCall { session_id: request_id.clone(), calls: client_calls });
            }

            messages.push(assistant_message.clone());

            for call in &server_calls {
                let outcome = self.execute_server_call(call).await;
                match outcome {
                    ServerCallOutcome::Oversized(text) => {
                        let chunks = feeder::chunk_text(ChunkSource::Tool(call.name.clone()), &text);
                        let adapter = FeederInvokerAdapter { invoker };
                        let final_content = PayloadFeeder::feed(&chunks, &adapter, &messages).await?;
                        return Ok(finalize_text(&final_content));
                    },
                    ServerCallOutcome::Result(text) => {
                        messages.push(Message::tool_result(call.id.clone(), text));
                    },
                    ServerCallOutcome::Failed(reason) => {
                        messages.push(Message::tool_result(call.id.clone(), format!("执行失败: {reason}")));
                    },
                }
            }

            tools_for_next = empty_tools.clone();
        }

        let response = invoker.invoke(&messages, &empty_tools).await?;
        let choice = response
            .choice0()
            .ok_or_else(|| AiError::Format("provider response carried no choices".to_string()))?;
        Ok(finalize(&choice.message))
    }

    async fn split_by_execution_kind(
        &self,
        role_name: &RoleName,
        calls: Vec<ToolCall>,
    ) -> Result<(Vec<ToolCall>, Vec<ToolCall>)> {
        let mut server_calls = Vec::new();
        let mut client_calls = Vec::new();
        for call in calls {
            let kind = match systemprompt_models::ExecutionKind::from_name_prefix(&call.name) {
                Some(kind) => kind,
                None => self
                    .catalog
                    .execution_kind_for(role_name, &call.name)
                    .await
                    .map_err(AiError::Other)?
                    .unwrap_or(systemprompt_models::ExecutionKind::Server),
            };
            match kind {
                systemprompt_models::ExecutionKind::Server => server_calls.push(call),
                systemprompt_models::ExecutionKind::Client => client_calls.push(call),
            }
        }
        Ok((server_calls, client_calls))
    }

    async fn execute_server_call(&self, call: &ToolCall) -> ServerCallOutcome {
        let Some((server, tool)) = parse_mcp_call_name(&call.name) else {
            return ServerCallOutcome::Failed(format!("cannot resolve MCP server for tool {}", call.name));
        };

        let client = match self.mcp.client(&server).await {
            Ok(client) => client,
            Err(err) => return ServerCallOutcome::Failed(err.to_string()),
        };

        let arguments = call.arguments.clone().into_value();
        match client.call_tool(&tool, arguments).await {
            Ok(value) => {
                let text = value.to_string();
                if text.chars().count() > feeder::CHUNK_SIZE {
                    ServerCallOutcome::Oversized(text)
                } else {
                    ServerCallOutcome::Result(text)
                }
            },
            Err(err) => ServerCallOutcome::Failed(err.to_string()),
        }
    }
}

enum ServerCallOutcome {
    Result(String),
    Oversized(String),
    Failed(String),
}

/// `mcp_{server}_{tool}` — the server name is the first underscore-delimited
/// segment after the `mcp_` prefix (§4.E scenario: `mcp_weather_get` calls
/// server `weather`).
fn parse_mcp_call_name(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix("mcp_")?;
    let (server, tool) = rest.split_once('_')?;
    Some((server.to_string(), tool.to_string()))
}

fn finalize(message: &Message) -> TurnOutcome {
    let text = message.content.as_text().unwrap_or_default();
    finalize_text(text)
}

fn finalize_text(text: &str) -> TurnOutcome {
    let extracted = strip_think_region(text);
    TurnOutcome::Final { content: extracted.content, think: extracted.think }
}

struct FeederInvokerAdapter<'a> {
    invoker: &'a dyn TurnInvoker,
}

#[async_trait]
impl ChunkInvoker for FeederInvokerAdapter<'_> {
    async fn invoke(&self, messages: Vec<Message>) -> Result<String> {
        let response = self.invoker.invoke(&messages, &[]).await?;
        let content = response
            .choice0()
            .and_then(|choice| choice.message.content.as_text())
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mcp_call_name_into_server_and_tool() {
        assert_eq!(
            parse_mcp_call_name("mcp_weather_get"),
            Some(("weather".to_string(), "get".to_string()))
        );
        assert_eq!(parse_mcp_call_name("client_execute_shell"), None);
    }
}
