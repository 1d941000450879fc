//! Tool trait and registry
//!
//! A tool is a named, schema-validated action. The registry validates raw
//! arguments before a handler ever runs and folds every failure into a
//! [`ToolResult`] error code, so nothing raw escapes a dispatch.

pub mod finance;
pub mod schema;

pub use finance::create_default_registry;
pub use schema::{FieldSpec, FieldType, FieldViolation, ParameterSpec, ToolSchema};

use crate::error::AgentError;
use crate::models::{ErrorCode, ToolInvocation, ToolOutput, ToolResult};
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Trait for a single tool handler.
///
/// Handlers receive a typed argument struct built from already-validated
/// arguments.
#[async_trait::async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + Send;

    async fn execute(&self, args: Self::Args, caller_id: &str) -> Result<ToolOutput>;
}

/// Object-safe view of a [`Tool`] working on validated JSON
#[async_trait::async_trait]
trait ErasedTool: Send + Sync {
    async fn call(&self, args: Value, caller_id: String) -> Result<ToolOutput>;
}

#[async_trait::async_trait]
impl<T: Tool> ErasedTool for T {
    async fn call(&self, args: Value, caller_id: String) -> Result<ToolOutput> {
        let typed: T::Args = serde_json::from_value(args)
            .map_err(|e| AgentError::ValidationError(format!("arguments do not fit handler: {}", e)))?;
        self.execute(typed, &caller_id).await
    }
}

struct RegisteredTool {
    schema: ToolSchema,
    handler: Arc<dyn ErasedTool>,
}

/// Tool registry for looking up and dispatching tools.
///
/// Registration takes `&mut self`, so once the registry is shared behind an
/// `Arc` it is read-only.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Last registration for a name wins
    pub fn register<T: Tool>(&mut self, schema: ToolSchema, handler: T) {
        let name = schema.name.clone();
        let previous = self.tools.insert(
            name.clone(),
            RegisteredTool {
                schema,
                handler: Arc::new(handler),
            },
        );

        if previous.is_some() {
            warn!(tool_name = %name, "tool re-registered, previous handler replaced");
        } else {
            debug!(tool_name = %name, "tool registered");
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name).map(|t| &t.schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All schemas sorted by name
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        let mut schemas: Vec<&ToolSchema> = self.tools.values().map(|t| &t.schema).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, name: &str, raw_arguments: Value, caller_id: &str) -> ToolResult {
        self.dispatch_invocation(ToolInvocation::new(name, raw_arguments, caller_id))
            .await
    }

    /// Validate, then run the handler on its own task so a panic is contained
    pub async fn dispatch_invocation(&self, invocation: ToolInvocation) -> ToolResult {
        let started = Instant::now();
        let ToolInvocation {
            invocation_id,
            tool_name,
            arguments,
            caller_id,
        } = invocation;

        let Some(tool) = self.tools.get(&tool_name) else {
            warn!(%invocation_id, tool_name = %tool_name, "dispatch to unknown tool");
            return ToolResult::failure(
                ErrorCode::ToolNotFound,
                format!("tool '{}' is not registered", tool_name),
            );
        };

        let validated = match tool.schema.parameters.validate(&arguments) {
            Ok(validated) => validated,
            Err(violations) => {
                let summary = violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");

                info!(
                    %invocation_id,
                    tool_name = %tool_name,
                    violations = violations.len(),
                    "arguments rejected"
                );

                return ToolResult::failure(
                    ErrorCode::ValidationError,
                    format!("invalid arguments for '{}': {}", tool_name, summary),
                )
                .with_data(json!({ "violations": violations }));
            }
        };

        let handler = tool.handler.clone();
        let task_caller = caller_id.clone();
        let joined =
            tokio::spawn(async move { handler.call(Value::Object(validated), task_caller).await })
                .await;

        let result = match joined {
            Ok(Ok(output)) => ToolResult::ok(output),
            Ok(Err(AgentError::ParseError(msg))) => ToolResult::failure(ErrorCode::ParseError, msg),
            Ok(Err(AgentError::ValidationError(msg))) => {
                ToolResult::failure(ErrorCode::ValidationError, msg)
            }
            Ok(Err(e)) => ToolResult::failure(ErrorCode::ExecutionError, e.to_string()),
            Err(join_error) if join_error.is_panic() => {
                ToolResult::failure(ErrorCode::ExecutionError, "tool handler panicked")
            }
            Err(join_error) => ToolResult::failure(
                ErrorCode::ExecutionError,
                format!("tool handler did not complete: {}", join_error),
            ),
        };

        info!(
            %invocation_id,
            tool_name = %tool_name,
            caller_id = %caller_id,
            success = result.success,
            error = ?result.error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool dispatched"
        );

        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
