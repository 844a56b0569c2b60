use thiserror::Error;

/// Error taxonomy for the provider/bridge/orchestrator/feeder layer (§7).
/// `ModelNotFound`, `NoKeys` and `InsufficientCredit` originate one layer out
/// (registry, credit ledger) and are folded into the same user-visible shape
/// by the facade rather than duplicated here.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("authentication failed with upstream provider {provider}")]
    Auth { provider: String },

    #[error("provider {provider} returned an error: {message}")]
    Provider {
        provider: String,
        message: String,
        code: Option<String>,
    },

    #[error("request or response failed canonical shape validation: {0}")]
    Format(String),

    #[error("file integrity check failed for file {file_id}: expected md5 {expected}, got {actual}")]
    FileIntegrity {
        file_id: String,
        expected: String,
        actual: String,
    },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("feeder exhausted retries on chunk {index}/{total}")]
    BudgetExceeded { index: usize, total: usize },

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Mcp(#[from] systemprompt_mcp::McpError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The user-visible error shape from §7: `{error: {message, type, code}}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
}

impl AiError {
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Auth { provider } => ErrorEnvelope {
                message: format!("Authentication failed with provider {provider}; try switching models."),
                error_type: "authentication_error".to_string(),
                code: "invalid_api_key".to_string(),
            },
            Self::Provider { message, code, .. } => ErrorEnvelope {
                message: message.clone(),
                error_type: "provider_error".to_string(),
                code: code.clone().unwrap_or_else(|| "provider_error".to_string()),
            },
            Self::Format(message) => ErrorEnvelope {
                message: message.clone(),
                error_type: "format_error".to_string(),
                code: "invalid_request".to_string(),
            },
            Self::FileIntegrity { file_id, .. } => ErrorEnvelope {
                message: format!("file {file_id} failed integrity verification"),
                error_type: "file_integrity_error".to_string(),
                code: "file_integrity".to_string(),
            },
            Self::ToolExecution(message) => ErrorEnvelope {
                message: message.clone(),
                error_type: "tool_execution_error".to_string(),
                code: "tool_execution".to_string(),
            },
            Self::BudgetExceeded { index, total } => ErrorEnvelope {
                message: format!("exhausted retries delivering chunk {index}/{total}"),
                error_type: "budget_exceeded".to_string(),
                code: "budget_exceeded".to_string(),
            },
            Self::Cancelled => ErrorEnvelope {
                message: "request cancelled".to_string(),
                error_type: "cancelled".to_string(),
                code: "cancelled".to_string(),
            },
            Self::Mcp(err) => ErrorEnvelope {
                message: err.to_string(),
                error_type: "tool_execution_error".to_string(),
                code: "mcp_error".to_string(),
            },
            Self::Other(err) => ErrorEnvelope {
                message: err.to_string(),
                error_type: "internal_error".to_string(),
                code: "internal_error".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
