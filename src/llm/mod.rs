//! Chat endpoint integration
//!
//! This module implements:
//! - The wire types shared with the chat completion endpoint
//! - A streaming HTTP client and the chunk decoder for its response bodies
//! - The error taxonomy used across the crate


pub mod client;
pub mod error;
pub mod streaming;
pub mod types;

pub use client::ChatClient;
pub use error::{CompanionError, Result};
pub use streaming::ChunkDecoder;
pub use types::*;

use async_trait::async_trait;

/// Trait for chat completion backends
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Sends the messages and waits for the whole reply
    async fn complete(&self, messages: Vec<ConversationTurn>) -> Result<ConversationTurn>;

    /// Sends the messages and returns a decoder over the streamed reply
    async fn stream(&self, messages: Vec<ConversationTurn>) -> Result<ChunkDecoder>;
}
