//! Umbrella crate for the systemprompt.io gateway, published to crates.io.
//!
//! Every domain lives in its own crate under `crates/`; this one just
//! re-exports them behind feature flags so embedders can pull in exactly the
//! layers they need — a handler author wants `api`, an MCP-only integration
//! wants `mcp`, a migration tool wants `database`. `full` wires up everything
//! the binary entry point needs.

#[cfg(feature = "core")]
pub use systemprompt_identifiers as identifiers;
#[cfg(feature = "core")]
pub use systemprompt_models as models;
#[cfg(feature = "core")]
pub use systemprompt_traits as traits;

#[cfg(feature = "database")]
pub use systemprompt_cache as cache;
#[cfg(feature = "database")]
pub use systemprompt_database as database;

#[cfg(feature = "mcp")]
pub use systemprompt_config as config;
#[cfg(feature = "mcp")]
pub use systemprompt_mcp as mcp;

#[cfg(feature = "registry")]
pub use systemprompt_catalog as catalog;
#[cfg(feature = "registry")]
pub use systemprompt_registry as registry;

#[cfg(feature = "ai")]
pub use systemprompt_ai as ai;

#[cfg(feature = "api")]
pub use systemprompt_api as api;

#[cfg(feature = "logging")]
pub use systemprompt_logging as logging;

/// Common imports for binaries embedding the gateway. Only populated by the
/// layers enabled through Cargo features.
pub mod prelude {
    #[cfg(feature = "api")]
    pub use systemprompt_api::{configure_routes, AppError, AppState};
    #[cfg(feature = "ai")]
    pub use systemprompt_ai::{AiError, ToolOrchestrator, TurnInvoker, TurnOutcome};
    #[cfg(feature = "registry")]
    pub use systemprompt_catalog::CatalogSynchronizer;
    #[cfg(feature = "registry")]
    pub use systemprompt_registry::{KeyRouter, ModelRegistry};
    #[cfg(feature = "core")]
    pub use systemprompt_identifiers::{ApiKeyId, ModelCode, ProviderKind, RequestId, UserId};
    #[cfg(feature = "core")]
    pub use systemprompt_models::{CanonicalRequest, CanonicalResponse, Message, ModelConfig};
}
