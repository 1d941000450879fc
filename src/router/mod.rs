//! Two-path command router
//!
//! STATE MACHINE:
//! AI_ATTEMPT → (DISPATCH | FALLBACK)
//! FALLBACK   → (DISPATCH | NO_MATCH)
//! DISPATCH and NO_MATCH are terminal.
//!
//! The completion call is the only blocking step and is bounded by a timeout;
//! a timeout is treated exactly like a decline. The router never retries.

pub mod prompt;

use crate::classifier::PatternMatcher;
use crate::completion::{ChatTurn, Completion, CompletionRequest, CompletionService};
use crate::memory::ConversationHistory;
use crate::models::ToolResult;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sentinel message for an uninterpretable input
pub const NO_MATCH_MESSAGE: &str = "could not interpret the message as a financial action";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteState {
    AiAttempt,
    Fallback,
    Dispatch,
    NoMatch,
}

/// Why the fallback path ran
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Completion service returned an error
    AiUnavailable,
    Timeout,
    /// No tool call in the completion
    Declined,
    /// More than one tool call
    Ambiguous,
    /// Named tool is not registered
    UnknownTool,
    /// No completion service configured
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutePath {
    Ai,
    Fallback,
}

/// Result of routing one message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Dispatched {
        tool_name: String,
        path: RoutePath,
        arguments: Value,
        result: ToolResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback_reason: Option<FallbackReason>,
        /// Matcher confidence, fallback path only. Informational.
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        trace: Vec<RouteState>,
    },
    NoMatch {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback_reason: Option<FallbackReason>,
        trace: Vec<RouteState>,
    },
}

impl RouteOutcome {
    pub fn result(&self) -> Option<&ToolResult> {
        match self {
            RouteOutcome::Dispatched { result, .. } => Some(result),
            RouteOutcome::NoMatch { .. } => None,
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            RouteOutcome::Dispatched { tool_name, .. } => Some(tool_name),
            RouteOutcome::NoMatch { .. } => None,
        }
    }

    pub fn path(&self) -> Option<RoutePath> {
        match self {
            RouteOutcome::Dispatched { path, .. } => Some(*path),
            RouteOutcome::NoMatch { .. } => None,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            RouteOutcome::Dispatched {
                fallback_reason, ..
            }
            | RouteOutcome::NoMatch {
                fallback_reason, ..
            } => *fallback_reason,
        }
    }

    pub fn trace(&self) -> &[RouteState] {
        match self {
            RouteOutcome::Dispatched { trace, .. } | RouteOutcome::NoMatch { trace, .. } => trace,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, RouteOutcome::NoMatch { .. })
    }
}

/// Conversation context handed to the completion service
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    /// Oldest first, excluding the message being routed
    pub history: Vec<ChatTurn>,
    /// Short facts for the prompt, e.g. known wallet names
    pub hints: Vec<String>,
}

impl RouteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_history(history: &ConversationHistory, max_messages: usize) -> Self {
        Self {
            history: ChatTurn::from_history(history, max_messages),
            hints: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub ai_timeout: Duration,
    pub max_context_messages: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ai_timeout: Duration::from_secs(8),
            max_context_messages: 10,
        }
    }
}

/// Internal step, carrying the data each transition needs
enum Step {
    AiAttempt,
    Fallback(FallbackReason),
    Dispatch {
        tool_name: String,
        arguments: Value,
        path: RoutePath,
        fallback_reason: Option<FallbackReason>,
        confidence: Option<f32>,
    },
    NoMatch(Option<FallbackReason>),
}

impl Step {
    fn state(&self) -> RouteState {
        match self {
            Step::AiAttempt => RouteState::AiAttempt,
            Step::Fallback(_) => RouteState::Fallback,
            Step::Dispatch { .. } => RouteState::Dispatch,
            Step::NoMatch(_) => RouteState::NoMatch,
        }
    }
}

pub struct CommandRouter {
    registry: Arc<ToolRegistry>,
    matcher: PatternMatcher,
    completion: Option<Arc<dyn CompletionService>>,
    config: RouterConfig,
}

impl CommandRouter {
    /// Without a completion service every message takes the fallback path
    pub fn new(
        registry: Arc<ToolRegistry>,
        completion: Option<Arc<dyn CompletionService>>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            matcher: PatternMatcher::with_default_rules(),
            completion,
            config,
        }
    }

    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn ai_enabled(&self) -> bool {
        self.completion.is_some()
    }

    pub async fn route(&self, text: &str, caller_id: &str, context: &RouteContext) -> RouteOutcome {
        let started = Instant::now();
        let mut trace = Vec::with_capacity(3);

        let mut step = if self.completion.is_some() {
            Step::AiAttempt
        } else {
            Step::Fallback(FallbackReason::Disabled)
        };

        loop {
            trace.push(step.state());
            debug!(caller_id = %caller_id, state = ?step.state(), "route transition");

            step = match step {
                Step::AiAttempt => self.attempt_ai(text, context).await,

                Step::Fallback(reason) => self.fallback(text, reason),

                Step::Dispatch {
                    tool_name,
                    arguments,
                    path,
                    fallback_reason,
                    confidence,
                } => {
                    let result = self
                        .registry
                        .dispatch(&tool_name, arguments.clone(), caller_id)
                        .await;

                    info!(
                        caller_id = %caller_id,
                        tool_name = %tool_name,
                        path = ?path,
                        fallback_reason = ?fallback_reason,
                        success = result.success,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "message routed"
                    );

                    return RouteOutcome::Dispatched {
                        tool_name,
                        path,
                        arguments,
                        result,
                        fallback_reason,
                        confidence,
                        trace,
                    };
                }

                Step::NoMatch(fallback_reason) => {
                    info!(
                        caller_id = %caller_id,
                        fallback_reason = ?fallback_reason,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "message not interpreted"
                    );

                    return RouteOutcome::NoMatch {
                        message: NO_MATCH_MESSAGE.to_string(),
                        fallback_reason,
                        trace,
                    };
                }
            };
        }
    }

    async fn attempt_ai(&self, text: &str, context: &RouteContext) -> Step {
        let Some(service) = &self.completion else {
            return Step::Fallback(FallbackReason::Disabled);
        };

        let request = self.build_request(text, context);
        let timeout = self.config.ai_timeout;

        match tokio::time::timeout(timeout, service.complete(&request)).await {
            Err(_) => {
                warn!(
                    service = service.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "completion timed out, falling back"
                );
                Step::Fallback(FallbackReason::Timeout)
            }
            Ok(Err(e)) => {
                warn!(service = service.name(), error = %e, "completion failed, falling back");
                Step::Fallback(FallbackReason::AiUnavailable)
            }
            Ok(Ok(completion)) => self.resolve_completion(completion),
        }
    }

    /// Exactly one call naming a registered tool dispatches; anything else falls back
    fn resolve_completion(&self, completion: Completion) -> Step {
        let mut calls = completion.resolved_tool_calls();

        match calls.len() {
            0 => Step::Fallback(FallbackReason::Declined),
            1 => {
                let call = calls.remove(0);
                if self.registry.contains(&call.name) {
                    Step::Dispatch {
                        tool_name: call.name,
                        arguments: call.arguments,
                        path: RoutePath::Ai,
                        fallback_reason: None,
                        confidence: None,
                    }
                } else {
                    warn!(tool_name = %call.name, "completion named an unregistered tool");
                    Step::Fallback(FallbackReason::UnknownTool)
                }
            }
            n => {
                warn!(tool_calls = n, "completion returned several tool calls");
                Step::Fallback(FallbackReason::Ambiguous)
            }
        }
    }

    fn fallback(&self, text: &str, reason: FallbackReason) -> Step {
        let matched = self
            .matcher
            .match_text(text)
            .and_then(|m| m.intent.tool_name().map(|tool| (tool, m)));

        match matched {
            Some((tool, m)) => Step::Dispatch {
                tool_name: tool.to_string(),
                arguments: Value::Object(m.extracted_data),
                path: RoutePath::Fallback,
                fallback_reason: Some(reason),
                confidence: Some(m.confidence),
            },
            None => Step::NoMatch(Some(reason)),
        }
    }

    fn build_request(&self, text: &str, context: &RouteContext) -> CompletionRequest {
        let tools: Vec<_> = self.registry.schemas().into_iter().cloned().collect();

        let keep = self.config.max_context_messages;
        let skip = context.history.len().saturating_sub(keep);
        let mut history: Vec<ChatTurn> = context.history.iter().skip(skip).cloned().collect();
        history.push(ChatTurn::user(text));

        CompletionRequest {
            system_prompt: prompt::build_system_prompt(&tools, &context.hints),
            history,
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ScriptedCompletion;
    use crate::finance::InMemoryFinanceService;
    use crate::models::ErrorCode;
    use crate::tools::create_default_registry;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(create_default_registry(Arc::new(InMemoryFinanceService::new())))
    }

    fn router_with(service: Option<Arc<ScriptedCompletion>>, timeout: Duration) -> CommandRouter {
        let completion = service.map(|s| s as Arc<dyn CompletionService>);
        CommandRouter::new(
            registry(),
            completion,
            RouterConfig {
                ai_timeout: timeout,
                max_context_messages: 2,
            },
        )
    }

    #[tokio::test]
    async fn test_ai_path_dispatches_single_tool_call() {
        let service = Arc::new(ScriptedCompletion::replying(Completion::tool_call(
            "create_expense",
            json!({ "amount": 25000, "description": "kopi" }),
        )));
        let router = router_with(Some(service.clone()), Duration::from_secs(1));

        let outcome = router.route("beli kopi 25rb", "u1", &RouteContext::new()).await;

        assert_eq!(outcome.path(), Some(RoutePath::Ai));
        assert_eq!(outcome.tool_name(), Some("create_expense"));
        assert!(outcome.result().unwrap().success);
        assert_eq!(outcome.fallback_reason(), None);
        assert_eq!(outcome.trace(), &[RouteState::AiAttempt, RouteState::Dispatch]);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_within_bound() {
        let service = Arc::new(
            ScriptedCompletion::replying(Completion::tool_call("calculate", json!({})))
                .with_delay(Duration::from_secs(10)),
        );
        let router = router_with(Some(service), Duration::from_millis(50));

        let started = Instant::now();
        let outcome = router.route("beli kopi 25rb", "u1", &RouteContext::new()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Timeout));
        assert_eq!(outcome.path(), Some(RoutePath::Fallback));
        assert_eq!(outcome.tool_name(), Some("create_expense"));
        assert_eq!(
            outcome.trace(),
            &[RouteState::AiAttempt, RouteState::Fallback, RouteState::Dispatch]
        );
    }

    #[tokio::test]
    async fn test_unregistered_tool_falls_back() {
        let service = Arc::new(ScriptedCompletion::replying(Completion::tool_call(
            "transfer_money",
            json!({ "amount": 25000 }),
        )));
        let router = router_with(Some(service), Duration::from_secs(1));

        let outcome = router.route("beli kopi 25rb", "u1", &RouteContext::new()).await;

        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::UnknownTool));
        assert_eq!(outcome.tool_name(), Some("create_expense"));
        let result = outcome.result().unwrap();
        assert!(result.success);
        assert_ne!(result.error, Some(ErrorCode::ToolNotFound));
    }

    #[tokio::test]
    async fn test_several_tool_calls_fall_back() {
        let mut completion = Completion::tool_call("create_expense", json!({}));
        completion.tool_calls.push(completion.tool_calls[0].clone());
        let router = router_with(
            Some(Arc::new(ScriptedCompletion::replying(completion))),
            Duration::from_secs(1),
        );

        let outcome = router.route("halo", "u1", &RouteContext::new()).await;

        assert!(outcome.is_no_match());
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Ambiguous));
    }

    #[tokio::test]
    async fn test_declined_and_error_fall_back() {
        let declined = router_with(
            Some(Arc::new(ScriptedCompletion::replying(Completion::text("Halo juga!")))),
            Duration::from_secs(1),
        );
        let outcome = declined.route("gaji 5jt", "u1", &RouteContext::new()).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Declined));
        assert_eq!(outcome.tool_name(), Some("create_income"));

        let failing = router_with(
            Some(Arc::new(ScriptedCompletion::failing("503"))),
            Duration::from_secs(1),
        );
        let outcome = failing.route("gaji 5jt", "u1", &RouteContext::new()).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::AiUnavailable));
    }

    #[tokio::test]
    async fn test_json_text_tool_call_is_accepted() {
        let reply = Completion::text(
            "```json\n{\"tool\": \"calculate\", \"arguments\": {\"expression\": \"3x5000\"}}\n```",
        );
        let router = router_with(
            Some(Arc::new(ScriptedCompletion::replying(reply))),
            Duration::from_secs(1),
        );

        let outcome = router.route("3x5000 berapa", "u1", &RouteContext::new()).await;

        assert_eq!(outcome.path(), Some(RoutePath::Ai));
        assert_eq!(outcome.result().unwrap().data.as_ref().unwrap()["total"], json!(15000.0));
    }

    #[tokio::test]
    async fn test_disabled_ai_starts_in_fallback() {
        let router = router_with(None, Duration::from_secs(1));

        let outcome = router.route("budget makanan 1 juta", "u1", &RouteContext::new()).await;

        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Disabled));
        assert_eq!(outcome.trace(), &[RouteState::Fallback, RouteState::Dispatch]);
        assert_eq!(outcome.tool_name(), Some("set_budget"));

        match outcome {
            RouteOutcome::Dispatched { confidence, .. } => assert_eq!(confidence, Some(0.8)),
            RouteOutcome::NoMatch { .. } => panic!("expected dispatch"),
        }
    }

    #[tokio::test]
    async fn test_no_match_sentinel() {
        let router = router_with(None, Duration::from_secs(1));

        let outcome = router.route("apa kabar?", "u1", &RouteContext::new()).await;

        assert!(outcome.is_no_match());
        assert!(outcome.result().is_none());
        assert_eq!(outcome.trace(), &[RouteState::Fallback, RouteState::NoMatch]);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], json!("no_match"));
        assert_eq!(json["fallback_reason"], json!("disabled"));
    }

    #[tokio::test]
    async fn test_request_carries_trimmed_context_and_tools() {
        let service = Arc::new(ScriptedCompletion::replying(Completion::text("ok")));
        let router = router_with(Some(service.clone()), Duration::from_secs(1));

        let context = RouteContext {
            history: vec![
                ChatTurn::user("first"),
                ChatTurn::assistant("second"),
                ChatTurn::user("third"),
            ],
            hints: Vec::new(),
        }
        .with_hint("Known wallets: gopay");
        router.route("isi saldo gopay 100k", "u1", &context).await;

        let request = service.last_request().unwrap();
        let contents: Vec<&str> = request.history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "third", "isi saldo gopay 100k"]);
        assert_eq!(request.tools.len(), 5);
        assert!(request.system_prompt.contains("Known wallets: gopay"));
    }

    #[tokio::test]
    async fn test_invalid_ai_arguments_surface_validation_error() {
        let service = Arc::new(ScriptedCompletion::replying(Completion::tool_call(
            "create_expense",
            json!({ "description": "kopi" }),
        )));
        let router = router_with(Some(service), Duration::from_secs(1));

        let outcome = router.route("beli kopi", "u1", &RouteContext::new()).await;

        assert_eq!(outcome.path(), Some(RoutePath::Ai));
        assert_eq!(outcome.result().unwrap().error, Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn test_custom_matcher_replaces_defaults() {
        let router = router_with(None, Duration::from_secs(1)).with_matcher(PatternMatcher::new());

        let outcome = router.route("beli kopi 25rb", "u1", &RouteContext::new()).await;

        assert!(outcome.is_no_match());
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::Disabled));
    }

    #[tokio::test]
    async fn test_subtraction_routes_within_bound() {
        let router = router_with(None, Duration::from_secs(1));

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            router.route("bayar 50rb - 5rb", "u1", &RouteContext::new()),
        )
        .await
        .expect("routing a subtraction must finish");

        assert_eq!(outcome.tool_name(), Some("create_expense"));
        assert!(outcome.result().unwrap().success);
        match outcome {
            RouteOutcome::Dispatched { arguments, .. } => {
                assert_eq!(arguments["amount"], json!(45000));
                assert_eq!(arguments["description"], json!("bayar"));
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_amount_is_no_match() {
        let router = Arc::new(router_with(None, Duration::from_secs(1)));

        let task = tokio::spawn({
            let router = router.clone();
            async move {
                router
                    .route(
                        "beli kopi 99999999999999999999 x 99999999999999999999",
                        "u1",
                        &RouteContext::new(),
                    )
                    .await
            }
        });
        let outcome = tokio_test::assert_ok!(task.await);

        assert!(outcome.is_no_match());
    }

    #[tokio::test]
    async fn test_oversized_ai_amount_is_validation_error() {
        let service = Arc::new(ScriptedCompletion::replying(Completion::tool_call(
            "create_expense",
            json!({
                "amount": "99999999999999999999 x 99999999999999999999",
                "description": "kopi"
            }),
        )));
        let router = router_with(Some(service), Duration::from_secs(1));

        let outcome = router.route("beli kopi", "u1", &RouteContext::new()).await;

        assert_eq!(outcome.path(), Some(RoutePath::Ai));
        assert_eq!(outcome.result().unwrap().error, Some(ErrorCode::ValidationError));
    }
}
