use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the conversational chain and its collaborators.
///
/// Each collaborator failure is wrapped exactly once in the variant naming the
/// step that produced it and handed back to the caller unchanged otherwise.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("model error: {0}")]
    Model(String),
    #[error("retriever error: {0}")]
    Retriever(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("prompt error: {0}")]
    Prompt(String),
    #[error("history error: {0}")]
    History(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    pub fn model<E: std::fmt::Display>(err: E) -> Self {
        RagError::Model(err.to_string())
    }

    pub fn retriever<E: std::fmt::Display>(err: E) -> Self {
        RagError::Retriever(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }

    pub fn history<E: std::fmt::Display>(err: E) -> Self {
        RagError::History(err.to_string())
    }

    pub fn config<E: std::fmt::Display>(err: E) -> Self {
        RagError::Config(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidInput(msg) => ApiError::BadRequest(msg),
            RagError::Model(_) | RagError::Retriever(_) | RagError::Embedding(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let api: ApiError = RagError::InvalidInput("empty input".into()).into();
        assert!(matches!(api, ApiError::BadRequest(msg) if msg == "empty input"));
    }

    #[test]
    fn collaborator_failures_map_to_unavailable() {
        let api: ApiError = RagError::model("upstream 500").into();
        assert!(matches!(api, ApiError::ServiceUnavailable(msg) if msg.contains("upstream 500")));

        let api: ApiError = RagError::retriever("index offline").into();
        assert_eq!(
            api.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn history_failure_is_internal() {
        let api: ApiError = RagError::history("db locked").into();
        assert_eq!(api.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
