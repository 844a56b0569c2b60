//! Canonical, OpenAI-chat-completions-shaped request/response types used
//! between the gateway facade, the format bridge and the tool orchestrator.

pub mod config;
pub mod message;
pub mod request;
pub mod response;
pub mod tools;

pub use config::{ApiKeyRecord, ModelConfig, ProviderModel};
pub use message::{ContentPart, Message, MessageRole};
pub use request::{CanonicalRequest, SamplingParams, ThinkingParams};
pub use response::{CanonicalResponse, Choice, FinishReason, Usage};
pub use tools::{ExecutionKind, ToolArguments, ToolCall, ToolDescriptor};
