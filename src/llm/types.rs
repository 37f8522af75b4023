use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
    System,
}

/// One message of a conversation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Speaker,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::System,
            content: content.into(),
        }
    }
}

/// Request body accepted by the chat completion endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ConversationTurn>,
    #[serde(default)]
    pub stream: bool,
}

/// Non-streaming reply of the chat completion endpoint
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChatReply {
    Turn(ConversationTurn),
    Error { error: String },
}

/// Error payload shared by all endpoints
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}
