//! Gemini completion client
//!
//! Adapter from [`CompletionService`] to the Gemini `generateContent` REST
//! endpoint with function declarations. Uses a long-lived reqwest::Client for
//! connection pooling. Transient failures (transport errors, 429, 5xx) are
//! retried with exponential backoff; the router itself never retries.

use crate::completion::{Completion, CompletionRequest, CompletionService, ToolCall};
use crate::error::AgentError;
use crate::memory::MessageRole;
use crate::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, retry: RetryPolicy) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", BASE_URL, model),
            retry,
        })
    }

    async fn send_once(&self, request: &GeminiRequest) -> Attempt {
        let response = match self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Gemini returned {}: {}", status, body);
            return if is_retryable(status) {
                Attempt::Retry(message)
            } else {
                Attempt::Fatal(AgentError::LlmError(message))
            };
        }

        match response.json::<GeminiResponse>().await {
            Ok(parsed) => Attempt::Done(parsed),
            Err(e) => Attempt::Fatal(AgentError::LlmError(format!("Gemini parse error: {}", e))),
        }
    }
}

enum Attempt {
    Done(GeminiResponse),
    Retry(String),
    Fatal(AgentError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait::async_trait]
impl CompletionService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = build_request(request);
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let delay = self.retry.delay_for(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "retrying Gemini call"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(attempt, tools = request.tools.len(), "calling Gemini API");

            match self.send_once(&body).await {
                Attempt::Done(response) => {
                    let completion = parse_response(response)?;
                    info!(
                        tool_calls = completion.tool_calls.len(),
                        "Gemini response received"
                    );
                    return Ok(completion);
                }
                Attempt::Retry(message) => last_error = message,
                Attempt::Fatal(e) => {
                    error!(error = %e, "Gemini call failed");
                    return Err(e);
                }
            }
        }

        error!(attempts = self.retry.max_attempts, error = %last_error, "Gemini unavailable");
        Err(AgentError::AiUnavailable(last_error))
    }
}

//
// ================= Wire Format =================
//

fn build_request(request: &CompletionRequest) -> GeminiRequest {
    let mut system_text = request.system_prompt.clone();
    let mut contents = Vec::with_capacity(request.history.len());

    for turn in &request.history {
        let role = match turn.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
            MessageRole::System => {
                system_text.push_str("\n\n");
                system_text.push_str(&turn.content);
                continue;
            }
        };

        contents.push(Content {
            role: Some(role.to_string()),
            parts: vec![Part::text(&turn.content)],
        });
    }

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolDeclarations {
            function_declarations: request
                .tools
                .iter()
                .map(|schema| FunctionDeclaration {
                    name: schema.name.clone(),
                    description: schema.description.clone(),
                    parameters: schema.parameters.to_json_schema(),
                })
                .collect(),
        }]
    };

    GeminiRequest {
        contents,
        system_instruction: SystemInstruction {
            parts: vec![Part::text(&system_text)],
        },
        tools,
        generation_config: GenerationConfig {
            temperature: 0.1,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 512,
        },
    }
}

fn parse_response(response: GeminiResponse) -> Result<Completion> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::LlmError("No candidates in Gemini response".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        debug!(finish_reason = reason, "Gemini candidate finished");
    }

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                name: call.name,
                arguments: call.args.unwrap_or(Value::Object(Default::default())),
            });
        } else if let Some(text) = part.text {
            texts.push(text);
        }
    }

    let content = (!texts.is_empty()).then(|| texts.join("\n"));
    Ok(Completion {
        content,
        tool_calls,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            function_call: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatTurn;
    use crate::tools::{FieldSpec, FieldType, ParameterSpec, ToolSchema};
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You route finance commands".to_string(),
            history: vec![
                ChatTurn::user("halo"),
                ChatTurn::assistant("Halo!"),
                ChatTurn {
                    role: MessageRole::System,
                    content: "Known wallets: gopay".to_string(),
                },
                ChatTurn::user("beli kopi 25rb"),
            ],
            tools: vec![ToolSchema::new(
                "create_expense",
                "Record an expense",
                ParameterSpec::new().field(FieldSpec::required("amount", FieldType::Amount, "Amount")),
            )],
        }
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(build_request(&request())).unwrap();

        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], json!("model"));
        assert_eq!(json["contents"][2]["parts"][0]["text"], json!("beli kopi 25rb"));

        let system = json["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(system.contains("Known wallets: gopay"));

        let declaration = &json["tools"][0]["functionDeclarations"][0];
        assert_eq!(declaration["name"], json!("create_expense"));
        assert_eq!(declaration["parameters"]["required"], json!(["amount"]));
        assert!(json["generationConfig"]["maxOutputTokens"].is_number());
    }

    #[test]
    fn test_request_without_tools_omits_field() {
        let mut req = request();
        req.tools.clear();
        let json = serde_json::to_value(build_request(&req)).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_parse_function_call_response() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "create_expense",
                            "args": { "amount": 25000, "description": "kopi" }
                        }
                    }]
                },
                "finishReason": "STOP"
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let completion = parse_response(response).unwrap();

        assert!(completion.content.is_none());
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].arguments["amount"], json!(25000));
    }

    #[test]
    fn test_parse_text_response() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Halo" }, { "text": "ada lagi?" }] }
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let completion = parse_response(response).unwrap();
        assert_eq!(completion.content.as_deref(), Some("Halo\nada lagi?"));
        assert!(completion.tool_calls.is_empty());
    }

    #[test]
    fn test_empty_candidates_is_error() {
        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parse_response(response), Err(AgentError::LlmError(_))));
    }

    #[test]
    fn test_retry_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(30), Duration::from_secs(5));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = GeminiClient::new(String::new(), DEFAULT_MODEL, RetryPolicy::default());
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
    }
}
