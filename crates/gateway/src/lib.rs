//! HTTP gateway for Ronnyx.
//!
//! - `POST /api/chat` runs one turn for a caller-identified session
//! - `GET /health` is a liveness probe with no dependency checks
//! - `GET /api/tools` lists the tools the model can call
//! - `GET /api/sessions/{id}` returns a session's stored history
//!
//! Built on Axum.

pub mod service;

pub use service::{ChatError, ChatService, TurnReply};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use ronnyx_config::AppConfig;
use ronnyx_core::event::EventBus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub chat: ChatService,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/tools", get(list_tools_handler))
        .route("/api/sessions/{id}", get(get_session_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(
    config: AppConfig,
    events: Arc<EventBus>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let chat = ChatService::from_config(&config, events).await?;
    let app = build_router(Arc::new(GatewayState { chat }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ChatError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidSession(_) => StatusCode::BAD_REQUEST,
            ChatError::Provider(_) => StatusCode::BAD_GATEWAY,
            ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Chat request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    info!(
        session_id = %payload.session_id,
        message_len = payload.message.len(),
        "Chat request received"
    );

    let turn = state.chat.chat(&payload.session_id, payload.message).await?;
    Ok(Json(ChatResponse {
        session_id: turn.session_id.into(),
        reply: turn.reply,
    }))
}

#[derive(Serialize)]
struct ToolDto {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolDto>,
    count: usize,
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let defs = state.chat.tool_definitions();
    let count = defs.len();

    Json(ToolListResponse {
        tools: defs
            .into_iter()
            .map(|d| ToolDto {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            })
            .collect(),
        count,
    })
}

#[derive(Serialize)]
struct MessageDto {
    role: &'static str,
    content: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
    messages: Vec<MessageDto>,
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, Response> {
    let messages = state
        .chat
        .history(&id)
        .await
        .map_err(IntoResponse::into_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Session '{id}' not found"),
                }),
            )
                .into_response()
        })?;

    Ok(Json(SessionResponse {
        session_id: id,
        messages: messages
            .into_iter()
            .map(|m| MessageDto {
                role: m.role.as_str(),
                content: m.content,
                timestamp: m.timestamp.to_rfc3339(),
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ronnyx_agent::{AgentGraph, Decision, Reasoner};
    use ronnyx_core::error::ProviderError;
    use ronnyx_core::message::Message;
    use ronnyx_core::provider::ToolDefinition;
    use ronnyx_memory::InMemoryStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct EchoReasoner;

    #[async_trait]
    impl Reasoner for EchoReasoner {
        fn model(&self) -> &str {
            "echo"
        }

        async fn decide(
            &self,
            history: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<Decision, ProviderError> {
            let last = history.last().map(|m| m.content.as_str()).unwrap_or("");
            if last == "fail" {
                return Err(ProviderError::Network("connection refused".into()));
            }
            Ok(Decision::Answer(Message::assistant(format!("You said: {last}"))))
        }
    }

    fn test_state() -> SharedState {
        let config = AppConfig::default();
        let tools = ronnyx_tools::default_registry(&config).unwrap();
        let graph = AgentGraph::new(Arc::new(EchoReasoner), Arc::new(tools));
        let chat = ChatService::new(Arc::new(graph), Arc::new(InMemoryStore::new()));
        Arc::new(GatewayState { chat })
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn chat_returns_reply_and_records_history() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(post_chat(json!({"session_id": "21", "message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body, json!({"session_id": "21", "reply": "You said: hello"}));

        let req = Request::builder()
            .uri("/api/sessions/21")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "You said: hello");
    }

    #[tokio::test]
    async fn empty_session_id_is_bad_request() {
        let app = build_router(test_state());
        let response = app
            .oneshot(post_chat(json!({"session_id": "", "message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "session_id must not be empty"})
        );
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let app = build_router(test_state());
        let response = app
            .oneshot(post_chat(json!({"message": "no session"})))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let state = test_state();
        let app = build_router(state.clone());
        let response = app
            .oneshot(post_chat(json!({"session_id": "x", "message": "fail"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
        assert!(state.chat.history("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/api/sessions/nobody")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_are_listed_in_registry_order() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/api/tools")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 26);
        assert_eq!(body["tools"][0]["name"], "github_whoami");
        assert_eq!(body["tools"][25]["name"], "delete_notion_task");
    }
}
