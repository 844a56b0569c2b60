use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::tools::ToolDescriptor;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThinkingParams {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// The canonical chat-completion request, as accepted at the facade and
/// rewritten by the format bridge into a provider-native body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
    #[serde(skip)]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

impl CanonicalRequest {
    #[must_use]
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    #[must_use]
    pub fn thinking(&self) -> Option<ThinkingParams> {
        self.thinking_enabled
            .filter(|enabled| *enabled)
            .map(|_| ThinkingParams {
                enabled: true,
                budget_tokens: self.thinking_budget,
            })
    }

    #[must_use]
    pub fn effective_role_name(&self) -> &str {
        self.role_name.as_deref().unwrap_or("general_assistant")
    }
}
