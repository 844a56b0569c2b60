use serde::{Deserialize, Serialize};

use crate::tools::ToolCall;

/// Role of a single canonical message. Tool-result messages are spliced in by the
/// orchestrator, never supplied verbatim by the caller except on resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One element of a message's content when the content is a list rather than
/// plain text. Mixed shapes (text, a file reference, an inline image or document)
/// are modeled as a tagged variant rather than forcing a single flat string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// References a file previously uploaded to the external file service by id;
    /// resolved by the format bridge, never sent to a provider as-is.
    FileRead {
        file_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        md5: Option<String>,
    },
    Image {
        /// Either a provider-native shape (already base64/handle) or a `data:` URL,
        /// transcoded by the bridge.
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Document {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Content of a message is either plain text or an ordered list of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Parts(_) => None,
        }
    }
}

/// A single message in the canonical conversation. `id` is always present after
/// normalization — the bridge generates one when the caller omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Set on `role: tool` messages; identifies which call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: MessageRole::Tool,
            content: MessageContent::Text(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Ensures this message carries an id, generating a fresh uuid if absent.
    /// This is invariant #1 from the testable-properties list: every message in
    /// a produced provider-format request carries an id after normalization.
    pub fn ensure_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }

    #[must_use]
    pub fn is_assistant(&self) -> bool {
        matches!(self.role, MessageRole::Assistant)
    }
}

/// Normalizes a whole message list in place: every message gets an id.
pub fn ensure_message_ids(messages: &mut [Message]) {
    for message in messages {
        message.ensure_id();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_message_ids_fills_missing_ids_only() {
        let mut messages = vec![
            Message::user("hi"),
            Message {
                id: Some("kept".to_string()),
                ..Message::user("again")
            },
        ];
        ensure_message_ids(&mut messages);
        assert!(messages[0].id.is_some());
        assert_eq!(messages[1].id.as_deref(), Some("kept"));
    }
}
