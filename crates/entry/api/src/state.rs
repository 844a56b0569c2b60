use std::sync::Arc;

use systemprompt_ai::providers::FileUploader;
use systemprompt_catalog::CatalogSynchronizer;
use systemprompt_mcp::McpManager;
use systemprompt_registry::{KeyRouter, ModelRegistry};
use systemprompt_traits::{CreditLedger, DurableCache, FileService, SystemPromptStore, ToolCatalog};

/// Shared application state handed to every route (teacher's `AppContext`
/// pattern, generalized to this gateway's collaborators). Cloning is cheap:
/// every field is either `Clone` over an `Arc` internally or already `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub registry: ModelRegistry,
    pub key_router: KeyRouter,
    pub mcp: McpManager,
    pub catalog: CatalogSynchronizer,
    pub cache: Arc<dyn DurableCache>,
    pub tool_catalog: Arc<dyn ToolCatalog>,
    pub credit_ledger: Arc<dyn CreditLedger>,
    pub file_service: Arc<dyn FileService>,
    pub prompt_store: Arc<dyn SystemPromptStore>,
}

impl AppState {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ModelRegistry,
        key_router: KeyRouter,
        mcp: McpManager,
        catalog: CatalogSynchronizer,
        cache: Arc<dyn DurableCache>,
        tool_catalog: Arc<dyn ToolCatalog>,
        credit_ledger: Arc<dyn CreditLedger>,
        file_service: Arc<dyn FileService>,
        prompt_store: Arc<dyn SystemPromptStore>,
    ) -> Self {
        Self {
            registry,
            key_router,
            mcp,
            catalog,
            cache,
            tool_catalog,
            credit_ledger,
            file_service,
            prompt_store,
        }
    }
}

/// Builds the Anthropic file-uploader for a resolved Anthropic model config,
/// or `None` for an OpenAI-compatible one (it has no separate upload API).
#[must_use]
pub fn uploader_for(
    provider_kind: systemprompt_identifiers::ProviderKind,
    base_url: &str,
    api_key: &str,
) -> Option<Box<dyn FileUploader>> {
    match provider_kind {
        systemprompt_identifiers::ProviderKind::Anthropic => Some(Box::new(
            systemprompt_ai::providers::anthropic::AnthropicClient::new(base_url.to_string(), api_key.to_string()),
        )),
        systemprompt_identifiers::ProviderKind::OpenAiCompatible => None,
    }
}
