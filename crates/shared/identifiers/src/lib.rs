//! Typed newtype identifiers shared across the gateway crates.
//!
//! Every boundary that used to pass a bare `String` around — a model code, an
//! API key id, a request id — gets its own type here so a registry lookup
//! can't accidentally be handed a `UserId` instead of a `ModelCode`.

mod provider_kind;

pub use provider_kind::ProviderKind;

use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "sqlx")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self(raw))
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

string_id!(ModelCode, "Stable internal identifier for a provider model family, e.g. `DeepSeek`.");
string_id!(ModelName, "Concrete provider-advertised model identifier, e.g. `deepseek-chat`.");
string_id!(ApiKeyId, "Primary key of an API-key record in the key pool.");
string_id!(UserId, "Caller identity, opaque to the gateway itself.");
string_id!(RoleName, "Selector for a stored system prompt, e.g. `general_assistant`.");
string_id!(RequestId, "Id of one public chat-completion request; doubles as the tool-call-context cache key and stream session id.");
string_id!(ToolCallId, "Id of a single tool invocation within a turn.");
string_id!(FileId, "Opaque handle into the external file service.");
string_id!(McpServerId, "Name of a configured MCP server, used as the MCP client-map key.");
string_id!(ToolName, "Name of a tool as advertised to a provider.");

impl RequestId {
    /// Generates a fresh chat request id: `CHAT_{user}_{unix_nanos}`.
    #[must_use]
    pub fn new_chat(user_id: &UserId, unix_nanos: u128) -> Self {
        Self(format!("CHAT_{user_id}_{unix_nanos}"))
    }

    /// Generates a fresh client-executor-result request id: `CER_{user}_{unix_nanos}`.
    #[must_use]
    pub fn new_cer(user_id: &UserId, unix_nanos: u128) -> Self {
        Self(format!("CER_{user_id}_{unix_nanos}"))
    }

    /// Derives the originating `CHAT_*` id from a `CER_*` id by string substitution.
    ///
    /// This is the fallback path described for tool-call-context resumption; prefer
    /// requiring callers to echo `session_id` explicitly wherever possible.
    #[must_use]
    pub fn derive_chat_from_cer(&self) -> Option<Self> {
        self.0.strip_prefix("CER_").map(|rest| Self(format!("CHAT_{rest}")))
    }

    #[must_use]
    pub fn is_cer(&self) -> bool {
        self.0.starts_with("CER_")
    }
}
