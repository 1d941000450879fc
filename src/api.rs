//! REST API server
//!
//! Thin HTTP surface over the command router and the calculator.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::calculator;
use crate::memory::{ConversationMessage, SessionStore};
use crate::router::{CommandRouter, RouteContext, RouteOutcome};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteRequest {
    pub message: String,
    #[serde(default)]
    pub caller_id: Option<String>,
    /// Extra prompt facts, e.g. "Known wallets: cash, gopay"
    #[serde(default)]
    pub hints: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalcRequest {
    pub expression: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<CommandRouter>,
    pub sessions: Arc<SessionStore>,
    pub context_max_messages: usize,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "ai_enabled": state.router.ai_enabled(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Tool Listing
/// =============================

async fn list_tools(State(state): State<ApiState>) -> Json<ApiResponse> {
    let tools: Vec<serde_json::Value> = state
        .router
        .registry()
        .schemas()
        .iter()
        .map(|schema| schema.to_json_schema())
        .collect();

    Json(ApiResponse::success(tools))
}

/// =============================
/// Routing Endpoint
/// =============================

async fn route_message(
    State(state): State<ApiState>,
    Json(req): Json<RouteRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let message = req.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("message must not be empty".into())),
        );
    }

    let caller_id = req
        .caller_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or("anonymous")
        .to_string();

    info!(caller_id = %caller_id, "route request received");

    let history = state.sessions.history(&caller_id).await;
    let mut context = RouteContext::from_history(&history, state.context_max_messages);
    context.hints = req.hints;

    let outcome = state.router.route(message, &caller_id, &context).await;

    state
        .sessions
        .record(&caller_id, ConversationMessage::user(message))
        .await;
    state
        .sessions
        .record(&caller_id, ConversationMessage::assistant(summarize(&outcome)))
        .await;

    (StatusCode::OK, Json(ApiResponse::success(&outcome)))
}

/// One-line record of an outcome for the conversation history
fn summarize(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Dispatched {
            tool_name, result, ..
        } => format!("[{}] {}", tool_name, result.message),
        RouteOutcome::NoMatch { message, .. } => message.clone(),
    }
}

/// =============================
/// Calculator Endpoint
/// =============================

async fn calculate(Json(req): Json<CalcRequest>) -> (StatusCode, Json<ApiResponse>) {
    if !calculator::is_valid_expression(&req.expression) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(format!(
                "'{}' is not a calculator expression",
                req.expression
            ))),
        );
    }

    match calculator::calculate(&req.expression) {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::success(result))),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/route", post(route_message))
        .route("/api/calc", post(calculate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
