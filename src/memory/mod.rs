//! Conversation memory
//!
//! Recent messages per caller, handed to the completion service as context.

pub mod sessions;
pub mod store;

pub use sessions::SessionStore;
pub use store::{ConversationHistory, ConversationMessage, MessageRole};
