use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    NotFound(String),
    /// A malformed request or an upstream document we cannot interpret.
    Invalid(String),
    Internal(anyhow::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Invalid(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_message(&self) -> String {
        match self {
            ServerError::NotFound(what) => format!("{what} not found"),
            ServerError::Invalid(message) => message.clone(),
            // Internals are logged server-side; clients get a generic message.
            ServerError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_message())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        if let ServerError::Internal(e) = &self {
            tracing::error!("Request failed: {e:#}");
        }
        (
            self.status_code(),
            Json(json!({"error": self.error_message()})),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(error: anyhow::Error) -> Self {
        ServerError::Internal(error)
    }
}
