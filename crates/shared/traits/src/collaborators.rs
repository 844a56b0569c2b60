use async_trait::async_trait;
use systemprompt_identifiers::{RoleName, UserId};
use systemprompt_models::ExecutionKind;

/// User credit ledger (§6). Called around each completion that uses a
/// platform key; deduction failure is logged but never fails the request.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn verify_and_check_tokens(&self, user_id: &UserId) -> anyhow::Result<(bool, i64)>;

    async fn deduct_tokens(&self, user_id: &UserId, n: u64) -> anyhow::Result<(bool, i64)>;
}

/// Resolved bytes for a file reference, as returned by [`FileService::download`].
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
}

/// File persistence collaborator (§6): byte storage for uploaded artifacts
/// lives outside the core; the bridge only resolves ids to bytes or uploads
/// base64 content back.
#[async_trait]
pub trait FileService: Send + Sync {
    async fn download(&self, file_id: &str, user_id: &UserId) -> anyhow::Result<DownloadedFile>;

    async fn upload_base64(
        &self,
        user_id: &UserId,
        base64_content: &str,
        name: &str,
        content_type: &str,
        mime_type: &str,
        size: u64,
    ) -> anyhow::Result<String>;
}

/// System-prompt store (§6): `get(role_name) -> text`, falling back to the
/// inbound `system` message when a role has no stored prompt.
#[async_trait]
pub trait SystemPromptStore: Send + Sync {
    async fn get(&self, role_name: &RoleName) -> anyhow::Result<Option<String>>;
}

/// Tool catalog (§6): resolves which tools a role may use and whether each
/// one executes client-side or server-side when its name carries no
/// recognized prefix.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn list_tools_for_role(
        &self,
        role_name: &RoleName,
    ) -> anyhow::Result<Vec<systemprompt_models::ToolDescriptor>>;

    /// Execution kind for a tool name absent a recognized prefix. Implementations
    /// typically consult the same catalog rows returned by `list_tools_for_role`.
    async fn execution_kind_for(
        &self,
        role_name: &RoleName,
        tool_name: &str,
    ) -> anyhow::Result<Option<ExecutionKind>>;
}
