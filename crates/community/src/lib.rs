//! Community module: direct-message conversations between society members.
//!
//! Pure domain logic only; storage and delivery live in infra/api.

pub mod chat;

pub use chat::{ChatMessage, Conversation, ConversationKey, MAX_MESSAGE_CHARS};
