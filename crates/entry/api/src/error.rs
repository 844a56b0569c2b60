use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use systemprompt_ai::{AiError, ErrorEnvelope};
use systemprompt_catalog::CatalogError;
use systemprompt_registry::RegistryError;

/// Every failure mode the facade can surface, collapsed to the canonical
/// `{error: {message, type, code}}` shape from §7 on the way out.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("insufficient credit balance")]
    InsufficientCredit,

    #[error("missing or malformed authorization header")]
    MissingApiKey,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Ai(AiError::Auth { .. }) => StatusCode::UNAUTHORIZED,
            Self::Ai(AiError::Format(_)) => StatusCode::BAD_REQUEST,
            Self::Ai(AiError::Cancelled) => StatusCode::BAD_REQUEST,
            Self::Registry(RegistryError::ModelNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Registry(RegistryError::NoKeys(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Catalog(CatalogError::ModelNotFound(_)) => StatusCode::NOT_FOUND,
            Self::InsufficientCredit => StatusCode::PAYMENT_REQUIRED,
            Self::MissingApiKey => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Ai(err) => err.to_envelope(),
            Self::InsufficientCredit => ErrorEnvelope {
                message: "account balance is insufficient for this model".to_string(),
                error_type: "insufficient_credit".to_string(),
                code: "insufficient_credit".to_string(),
            },
            Self::MissingApiKey => ErrorEnvelope {
                message: "missing or malformed Authorization header".to_string(),
                error_type: "authentication_error".to_string(),
                code: "missing_api_key".to_string(),
            },
            other => ErrorEnvelope {
                message: other.to_string(),
                error_type: "internal_error".to_string(),
                code: "internal_error".to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (self.status(), Json(ErrorBody { error: self.envelope() })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
