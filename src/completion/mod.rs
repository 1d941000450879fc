//! Completion service boundary
//!
//! The router talks to an external LLM only through [`CompletionService`].
//! A completion either names tools to call or answers with plain text.

use crate::memory::{ConversationHistory, MessageRole};
use crate::tools::ToolSchema;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// The `count` most recent history messages, oldest first
    pub fn from_history(history: &ConversationHistory, count: usize) -> Vec<Self> {
        history
            .recent_messages(count)
            .map(|m| Self {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments,
            }],
        }
    }

    /// Native tool calls, or a single call encoded as JSON in the text
    pub fn resolved_tool_calls(&self) -> Vec<ToolCall> {
        if !self.tool_calls.is_empty() {
            return self.tool_calls.clone();
        }

        self.content
            .as_deref()
            .and_then(parse_text_tool_call)
            .into_iter()
            .collect()
    }
}

/// Everything one completion call needs
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Oldest first; the last turn is the message being interpreted
    pub history: Vec<ChatTurn>,
    pub tools: Vec<ToolSchema>,
}

/// Trait for LLM completion backends
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Read `{"tool": ..., "arguments": {...}}` from text, optionally inside a
/// ```json fence. `name`/`args` are accepted as aliases.
pub fn parse_text_tool_call(content: &str) -> Option<ToolCall> {
    let candidate = fenced_json(content).or_else(|| braced_json(content))?;
    let object = candidate.as_object()?;

    let name = object
        .get("tool")
        .or_else(|| object.get("name"))
        .and_then(Value::as_str)?
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    let arguments = object
        .get("arguments")
        .or_else(|| object.get("args"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    Some(ToolCall { name, arguments })
}

fn fenced_json(text: &str) -> Option<Value> {
    let start = text.find("```json")?;
    let after = &text[start + 7..];
    let end = after.find("```")?;
    serde_json::from_str(after[..end].trim()).ok()
}

/// Largest `{ ... }` block in the text
fn braced_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

//
// ================= Test Double =================
//

/// Scripted completion service for development and tests.
/// Replies with a fixed completion or error, optionally after a delay.
pub struct ScriptedCompletion {
    reply: std::result::Result<Completion, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn replying(completion: Completion) -> Self {
        Self::build(Ok(completion))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::build(Err(message.into()))
    }

    fn build(reply: std::result::Result<Completion, String>) -> Self {
        Self {
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply
            .clone()
            .map_err(crate::error::AgentError::AiUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationMessage;
    use serde_json::json;

    #[test]
    fn test_parse_fenced_tool_call() {
        let content = "Sure!\n```json\n{\"tool\": \"create_expense\", \"arguments\": {\"amount\": 25000}}\n```";
        let call = parse_text_tool_call(content).unwrap();

        assert_eq!(call.name, "create_expense");
        assert_eq!(call.arguments, json!({ "amount": 25000 }));
    }

    #[test]
    fn test_parse_bare_object_with_aliases() {
        let call = parse_text_tool_call(r#"{"name": "calculate", "args": {"expression": "3x5000"}}"#).unwrap();
        assert_eq!(call.name, "calculate");
        assert_eq!(call.arguments["expression"], json!("3x5000"));

        let no_args = parse_text_tool_call(r#"{"tool": "add_balance"}"#).unwrap();
        assert_eq!(no_args.arguments, json!({}));
    }

    #[test]
    fn test_plain_text_is_not_a_tool_call() {
        assert!(parse_text_tool_call("Halo! Ada yang bisa dibantu?").is_none());
        assert!(parse_text_tool_call(r#"{"amount": 5}"#).is_none());
        assert!(parse_text_tool_call("} broken {").is_none());
    }

    #[test]
    fn test_native_calls_take_precedence() {
        let completion = Completion {
            content: Some(r#"{"tool": "calculate"}"#.to_string()),
            tool_calls: vec![ToolCall {
                name: "create_expense".into(),
                arguments: json!({}),
            }],
        };

        let calls = completion.resolved_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "create_expense");
        assert!(Completion::text("no tools here").resolved_tool_calls().is_empty());
    }

    #[test]
    fn test_turns_from_history() {
        let mut history = ConversationHistory::new("u1");
        history.add_message(ConversationMessage::user("one"));
        history.add_message(ConversationMessage::assistant("two"));
        history.add_message(ConversationMessage::user("three"));

        let turns = ChatTurn::from_history(&history, 2);
        assert_eq!(turns, vec![ChatTurn::assistant("two"), ChatTurn::user("three")]);
    }

    #[tokio::test]
    async fn test_scripted_completion_records_requests() {
        let service = ScriptedCompletion::failing("offline");
        let request = CompletionRequest {
            system_prompt: "sys".into(),
            history: vec![ChatTurn::user("hi")],
            tools: Vec::new(),
        };

        let result = service.complete(&request).await;
        tokio_test::assert_err!(result);
        assert_eq!(service.calls(), 1);
        assert_eq!(service.last_request().unwrap().history.len(), 1);
    }
}
