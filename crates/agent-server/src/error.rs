use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Why a chat request did not produce a stream.
///
/// The display text is what the caller sees in the `error` field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("MCP Client Error: {0}")]
    Connection(String),

    #[error("Tools Error: {0}")]
    Discovery(String),

    /// Passed through unprefixed.
    #[error("{0}")]
    Generation(String),

    /// Logged only, never returned to the caller.
    #[error("Cleanup Error: {0}")]
    Cleanup(String),
}

impl RequestError {
    /// Lifecycle stage the error was raised in, for log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            RequestError::InvalidRequest(_) => "decode",
            RequestError::Connection(_) => "connect",
            RequestError::Discovery(_) => "discover",
            RequestError::Generation(_) => "generate",
            RequestError::Cleanup(_) => "cleanup",
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    error: String,
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(JsonError {
            error: self.to_string(),
        })
    }
}
