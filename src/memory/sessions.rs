//! Per-caller conversation sessions
//!
//! Keeps a bounded [`ConversationHistory`] for every caller so transports can
//! hand recent context to the router between requests. The number of callers
//! is capped too: recording for a new caller past the cap evicts the caller
//! that was recorded least recently.

use crate::memory::store::{ConversationHistory, ConversationMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Default number of callers kept in memory
pub const DEFAULT_MAX_CALLERS: usize = 10_000;

struct Session {
    history: ConversationHistory,
    /// Logical clock value of the last `record`
    last_seen: u64,
}

#[derive(Default)]
struct Sessions {
    by_caller: HashMap<String, Session>,
    clock: u64,
}

pub struct SessionStore {
    sessions: Arc<RwLock<Sessions>>,
    max_messages: usize,
    max_callers: usize,
}

impl SessionStore {
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Sessions::default())),
            max_messages,
            max_callers: DEFAULT_MAX_CALLERS,
        }
    }

    pub fn with_max_callers(mut self, max_callers: usize) -> Self {
        self.max_callers = max_callers.max(1);
        self
    }

    /// Snapshot of the caller's history (empty for unknown callers)
    pub async fn history(&self, caller_id: &str) -> ConversationHistory {
        let sessions = self.sessions.read().await;
        sessions
            .by_caller
            .get(caller_id)
            .map(|s| s.history.clone())
            .unwrap_or_else(|| ConversationHistory::new(caller_id))
    }

    /// Append and trim to the configured window
    pub async fn record(&self, caller_id: &str, message: ConversationMessage) {
        let mut sessions = self.sessions.write().await;
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.by_caller.contains_key(caller_id)
            && sessions.by_caller.len() >= self.max_callers
        {
            let stalest = sessions
                .by_caller
                .iter()
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(id, _)| id.clone());

            if let Some(evicted) = stalest {
                debug!(caller_id = %evicted, "evicting idle session");
                sessions.by_caller.remove(&evicted);
            }
        }

        let session = sessions
            .by_caller
            .entry(caller_id.to_string())
            .or_insert_with(|| Session {
                history: ConversationHistory::new(caller_id),
                last_seen: now,
            });

        session.last_seen = now;
        session.history.add_message(message);
        session.history.trim_to_recent(self.max_messages);
    }

    pub async fn clear(&self, caller_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.by_caller.remove(caller_id);
    }

    pub async fn caller_count(&self) -> usize {
        self.sessions.read().await.by_caller.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_is_bounded_per_caller() {
        let store = SessionStore::new(3);

        for i in 0..5 {
            store
                .record("u1", ConversationMessage::user(format!("msg {}", i)))
                .await;
        }
        store.record("u2", ConversationMessage::user("hello")).await;

        let history = store.history("u1").await;
        assert_eq!(history.message_count(), 3);
        assert_eq!(history.messages().next().unwrap().content, "msg 2");
        assert_eq!(store.history("u2").await.message_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_caller_and_clear() {
        let store = SessionStore::default();
        assert!(store.history("nobody").await.is_empty());

        store.record("u1", ConversationMessage::user("hi")).await;
        store.clear("u1").await;
        assert!(store.history("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_caller_cap_evicts_least_recent() {
        let store = SessionStore::new(5).with_max_callers(2);

        store.record("a", ConversationMessage::user("one")).await;
        store.record("b", ConversationMessage::user("two")).await;
        store.record("a", ConversationMessage::user("three")).await;
        store.record("c", ConversationMessage::user("four")).await;

        assert_eq!(store.caller_count().await, 2);
        assert!(store.history("b").await.is_empty());
        assert_eq!(store.history("a").await.message_count(), 2);
        assert_eq!(store.history("c").await.message_count(), 1);
    }

    #[tokio::test]
    async fn test_many_callers_stay_within_cap() {
        let store = SessionStore::new(2).with_max_callers(8);

        for i in 0..100 {
            store
                .record(&format!("caller-{}", i), ConversationMessage::user("hi"))
                .await;
        }

        assert_eq!(store.caller_count().await, 8);
        assert!(!store.history("caller-99").await.is_empty());
        assert!(store.history("caller-0").await.is_empty());
    }
}
