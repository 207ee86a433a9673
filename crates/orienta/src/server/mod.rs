//! HTTP chat surface
//!
//! One request/response endpoint over the dialogue engine: `POST /chat`
//! accepts `{message, session_id}` and returns `{reply}`. The session id is
//! optional and defaults from configuration, matching the original web
//! front end contract. `GET /health` reports liveness.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::engine::DialogueEngine;
use crate::error::{OrientaError, Result};
use crate::session::SessionId;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// The dialogue engine processing every turn
    pub engine: Arc<DialogueEngine>,
    /// Session id used when a request carries none
    pub default_session_id: String,
}

/// The chat server
pub struct ChatServer {
    config: ServerConfig,
    engine: Arc<DialogueEngine>,
}

impl ChatServer {
    pub fn new(config: ServerConfig, engine: Arc<DialogueEngine>) -> Self {
        Self { config, engine }
    }

    /// Bind the configured address and serve until ctrl-c or SIGTERM.
    pub async fn serve(&self) -> Result<()> {
        let state = Arc::new(AppState {
            engine: self.engine.clone(),
            default_session_id: self.config.default_session_id.clone(),
        });

        let app = create_router(state);

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| OrientaError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting chat server on {addr}");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| OrientaError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| OrientaError::Server(format!("Server error: {e}")))?;

        tracing::info!("Chat server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    reply: String,
}

/// Chat endpoint: validate the session id, run one turn, return the reply.
///
/// The engine itself never fails a turn; the only client error here is a
/// malformed session id.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let raw_id = request
        .session_id
        .unwrap_or_else(|| state.default_session_id.clone());

    let session_id = match SessionId::try_from(raw_id.as_str()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejected session id {raw_id:?}: {e}");
            return create_error_response(StatusCode::BAD_REQUEST, "invalid_session_id", &e.to_string());
        }
    };

    let reply = state.engine.respond(&session_id, &request.message).await;
    Json(ChatReply { reply }).into_response()
}

/// Create a JSON error response
fn create_error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap()
        })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::session::SessionStore;
    use crate::testing::{MockGenerationBackend, MockIndexGateway};

    fn test_state(backend: Arc<MockGenerationBackend>) -> Arc<AppState> {
        let config = Config::default();
        let engine = DialogueEngine::new(
            &config,
            Arc::new(MockIndexGateway::with_chunks(vec![
                crate::retrieval::types::Chunk::new("El arancel anual es de 4 millones."),
            ])),
            backend,
            Arc::new(SessionStore::new()),
        );
        Arc::new(AppState {
            engine: Arc::new(engine),
            default_session_id: "usuario_web".to_string(),
        })
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state(Arc::new(MockGenerationBackend::new())));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_chat_happy_path() {
        let backend = Arc::new(MockGenerationBackend::with_reply("Cuesta 4 millones."));
        let app = create_router(test_state(backend));

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "message": "¿cuánto cuesta el doctorado en informática?",
                "session_id": "web-1"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Cuesta 4 millones."));
    }

    #[tokio::test]
    async fn test_chat_without_session_id_uses_default() {
        let backend = Arc::new(MockGenerationBackend::with_reply("ok"));
        let state = test_state(backend);
        let app = create_router(state.clone());

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "message": "requisitos del doctorado en informática"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let default_id = SessionId::try_from("usuario_web").unwrap();
        assert_eq!(state.engine.sessions().history(&default_id).len(), 2);
    }

    #[tokio::test]
    async fn test_chat_invalid_session_id_rejected() {
        let app = create_router(test_state(Arc::new(MockGenerationBackend::new())));

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "message": "hola",
                "session_id": "no válido!"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("invalid_session_id"));
    }

    #[tokio::test]
    async fn test_chat_engine_failure_maps_to_apology() {
        let backend = Arc::new(MockGenerationBackend::failing());
        let app = create_router(test_state(backend));

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "message": "requisitos del doctorado en informática",
                "session_id": "web-2"
            })))
            .await
            .unwrap();

        // The engine converts external failures into the apology template
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            body_string(response)
                .await
                .contains(&Config::default().templates.apology)
        );
    }
}
