//! Core data models for the command-interpretation pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

//
// ================= Error Codes =================
//

/// Error tag carried by a failed [`ToolResult`].
///
/// `AI_UNAVAILABLE` never reaches a result (the router falls back) and
/// `NO_MATCH` is its own outcome variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParseError,
    ValidationError,
    ToolNotFound,
    ExecutionError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ================= Tool I/O =================
//

/// One dispatch request. Lives only for the duration of a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub invocation_id: Uuid,
    pub tool_name: String,
    pub arguments: Value,
    pub caller_id: String,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, arguments: Value, caller_id: impl Into<String>) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            arguments,
            caller_id: caller_id.into(),
        }
    }
}

/// What a handler hands back on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub data: Value,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ToolOutput {
    pub fn new(data: Value, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }
}

/// Uniform envelope returned by every dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ToolResult {
    pub fn ok(output: ToolOutput) -> Self {
        Self {
            success: true,
            data: Some(output.data),
            message: output.message,
            error: None,
            metadata: output.metadata,
        }
    }

    pub fn failure(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
            error: Some(error),
            metadata: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

//
// ================= Pattern Matching =================
//

/// Coarse classification of the requested financial action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateExpense,
    CreateIncome,
    SetBudget,
    AddBalance,
    None,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateExpense => "create_expense",
            Intent::CreateIncome => "create_income",
            Intent::SetBudget => "set_budget",
            Intent::AddBalance => "add_balance",
            Intent::None => "none",
        }
    }

    /// Tool the fallback path dispatches for this intent
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            Intent::None => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the heuristic matcher. Created per input, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternMatch {
    pub intent: Intent,
    /// Fixed fallback-tier value, not a calibrated probability
    pub confidence: f32,
    pub extracted_data: Map<String, Value>,
}
