//! Conversation history storage
//!
//! Timestamped messages per caller, used as context for the completion
//! service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
    /// Approximate token count for context window management
    pub token_count: usize,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = (content.len() + 3) / 4;

        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
            token_count,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Conversation history for one caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub caller_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: VecDeque<ConversationMessage>,
    /// Total token count (approximate)
    total_tokens: usize,
}

impl ConversationHistory {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: VecDeque::new(),
            total_tokens: 0,
        }
    }

    pub fn add_message(&mut self, message: ConversationMessage) {
        self.total_tokens += message.token_count;
        self.messages.push_back(message);
        self.updated_at = Utc::now();
    }

    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    /// The `count` most recent messages, oldest first
    pub fn recent_messages(&self, count: usize) -> impl Iterator<Item = &ConversationMessage> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip)
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Recompute token count (prevents drift)
    fn recompute_total_tokens(&mut self) {
        self.total_tokens = self.messages.iter().map(|m| m.token_count).sum();
    }

    /// Drop everything except the last `keep_count` messages
    pub fn trim_to_recent(&mut self, keep_count: usize) {
        if self.messages.len() <= keep_count {
            return;
        }

        while self.messages.len() > keep_count {
            self.messages.pop_front();
        }

        self.recompute_total_tokens();
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_tokens = 0;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_message_creation() {
        let msg = ConversationMessage::user("beli kopi 25rb");
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.token_count > 0);
    }

    #[test]
    fn test_conversation_history() {
        let mut history = ConversationHistory::new("user-1");

        history.add_message(ConversationMessage::user("beli kopi 25rb"));
        history.add_message(ConversationMessage::assistant("Expense of 25000 recorded"));

        assert_eq!(history.message_count(), 2);
        assert!(history.total_tokens() > 0);
    }

    #[test]
    fn test_recent_messages_oldest_first() {
        let mut history = ConversationHistory::new("user-1");
        for i in 0..5 {
            history.add_message(ConversationMessage::user(format!("message {}", i)));
        }

        let recent: Vec<&str> = history.recent_messages(2).map(|m| m.content.as_str()).collect();
        assert_eq!(recent, vec!["message 3", "message 4"]);
        assert_eq!(history.recent_messages(50).count(), 5);
    }

    #[test]
    fn test_trim_to_recent() {
        let mut history = ConversationHistory::new("user-1");

        for i in 0..10 {
            history.add_message(ConversationMessage::user(format!("Question {}", i)));
        }
        let before = history.total_tokens();

        history.trim_to_recent(5);
        assert_eq!(history.message_count(), 5);
        assert!(history.total_tokens() < before);
        assert_eq!(history.messages().next().unwrap().content, "Question 5");
    }
}
