use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health, sessions};
use crate::state::AppState;

/// Creates the application router.
///
/// Routes:
/// - `GET /health`
/// - `POST /api/chat`
/// - `GET /api/sessions`
/// - `GET /api/sessions/:session_id/messages`
/// - `DELETE /api/sessions/:session_id`
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/sessions", get(sessions::list_sessions))
        .route(
            "/api/sessions/:session_id",
            delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            get(sessions::get_session_messages),
        )
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let origins = resolve_allowed_origins(configured)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::chain::RagChainBuilder;
    use crate::core::config::AppConfig;
    use crate::core::errors::RagError;
    use crate::llm::{ChatModel, ChatRequest};
    use crate::rag::{Document, VectorStore};

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo: {last}"))
        }

        async fn stream_chat(
            &self,
            _request: ChatRequest,
        ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
            Err(RagError::Model("streaming not supported".to_string()))
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl VectorStore for EmptyStore {
        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<Document>, RagError> {
            Ok(Vec::new())
        }

        async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, RagError> {
            Ok(documents.len())
        }
    }

    fn app() -> Router {
        let chain = RagChainBuilder::new(Arc::new(EchoModel), Arc::new(EmptyStore)).build();
        router(AppState::new(AppConfig::default(), chain))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_model_and_k() {
        let app = app();
        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["top_k"], 3);
    }

    #[tokio::test]
    async fn chat_round_trip_records_history() {
        let app = app();
        let (status, body) = send(
            &app,
            post_chat(json!({ "input": "Is this phone waterproof?", "session_id": "s1" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["answer"], "echo: Is this phone waterproof?");

        let (status, body) = send(
            &app,
            Request::get("/api/sessions/s1/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[tokio::test]
    async fn chat_without_session_id_gets_one_assigned() {
        let app = app();
        let (status, body) = send(&app, post_chat(json!({ "input": "Does it have a charger?" }))).await;

        assert_eq!(status, StatusCode::OK);
        let session_id = body["session_id"].as_str().expect("session id");
        assert!(uuid::Uuid::parse_str(session_id).is_ok());
    }

    #[tokio::test]
    async fn blank_input_is_bad_request() {
        let app = app();
        let (status, body) = send(&app, post_chat(json!({ "input": "   ", "session_id": "s1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("input"));
    }

    #[tokio::test]
    async fn deleting_unknown_session_is_not_found() {
        let app = app();
        let request = Request::delete("/api/sessions/ghost").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let app = app();
        send(&app, post_chat(json!({ "input": "q", "session_id": "s1" }))).await;

        let (status, body) = send(&app, Request::delete("/api/sessions/s1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = send(&app, Request::get("/api/sessions").body(Body::empty()).unwrap()).await;
        assert_eq!(body["sessions"], json!([]));
    }

    #[test]
    fn configured_origins_replace_defaults() {
        let origins = resolve_allowed_origins(&["https://shop.example.com ".to_string(), "".to_string()]);
        assert_eq!(origins, vec!["https://shop.example.com"]);
        assert!(resolve_allowed_origins(&[]).contains(&"http://localhost:3000".to_string()));
    }
}
