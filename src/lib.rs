//! Code companion: streams code analysis, mock execution and chat replies
//! from a chat completion endpoint, and serves a small rule-based crop
//! recommender.
//!
//! The core is the streamed-reply pipeline in [`session`]: chunks from
//! [`llm::ChunkDecoder`] are accumulated, rescanned for highlight markers and
//! finally reconciled into the [`session::Conversation`].

pub mod companion;
pub mod config;
pub mod crop;
pub mod format;
pub mod highlight;
pub mod llm;
pub mod persistence;
pub mod server;
pub mod session;
