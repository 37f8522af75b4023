use crate::llm::error::{CompanionError, Result};
use crate::llm::streaming::ChunkDecoder;
use crate::llm::types::*;
use crate::llm::ChatEndpoint;
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};

/// HTTP client for the chat completion endpoint
pub struct ChatClient {
    client: Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &ChatRequest) -> Result<Response> {
        debug!(
            "Sending {} message(s) to {} (stream: {})",
            request.messages.len(),
            self.endpoint,
            request.stream
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Chat endpoint returned {}: {}", status, body);
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(error_body) => CompanionError::Upstream(error_body.error),
                Err(_) => CompanionError::Transport(format!("API error: {status}")),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatEndpoint for ChatClient {
    async fn complete(&self, messages: Vec<ConversationTurn>) -> Result<ConversationTurn> {
        let request = ChatRequest {
            messages,
            stream: false,
        };
        let response = self.post(&request).await?;
        let body = response.text().await?;

        match serde_json::from_str::<ChatReply>(&body) {
            Ok(ChatReply::Turn(turn)) => Ok(turn),
            Ok(ChatReply::Error { error }) => Err(CompanionError::Upstream(error)),
            Err(e) => Err(CompanionError::Upstream(format!(
                "Failed to parse response: {e}"
            ))),
        }
    }

    async fn stream(&self, messages: Vec<ConversationTurn>) -> Result<ChunkDecoder> {
        let request = ChatRequest {
            messages,
            stream: true,
        };
        let response = self.post(&request).await?;
        Ok(ChunkDecoder::from_response(response))
    }
}
