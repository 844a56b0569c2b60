pub mod bridge;
pub mod error;
pub mod feeder;
pub mod orchestrator;
pub mod providers;

pub use error::{AiError, ErrorEnvelope, Result};
pub use orchestrator::{ClientExecutorResult, ToolOrchestrator, TurnInvoker, TurnOutcome};
pub use providers::{FileUploader, ModelLister, ProviderClient, RawStreamChunk};
