use actix_web::{HttpResponse, ResponseError};
use agent_llm::data_stream::{
    encode_part, DATA_STREAM_CONTENT_TYPE, DATA_STREAM_HEADER, DATA_STREAM_VERSION,
};
use agent_llm::GenerationStream;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::controller::RequestOutcome;

/// Turns a [`RequestOutcome`] into the HTTP response.
pub struct ResponseTranslator;

impl ResponseTranslator {
    pub fn translate(request_id: &str, outcome: RequestOutcome) -> HttpResponse {
        match outcome {
            RequestOutcome::StreamedSuccess(stream) => Self::stream(request_id, stream),
            failure => match failure.error() {
                Some(error) => {
                    warn!(stage = error.stage(), "[{}] Responding with {}", request_id, error);
                    error.error_response()
                }
                None => HttpResponse::InternalServerError().finish(),
            },
        }
    }

    /// Data stream body; each part is written as soon as it is produced.
    ///
    /// Dropping the body (client disconnect) drops the generation stream,
    /// which cancels the generation task.
    fn stream(request_id: &str, mut parts: GenerationStream) -> HttpResponse {
        let request_id = request_id.to_string();

        HttpResponse::Ok()
            .content_type(DATA_STREAM_CONTENT_TYPE)
            .append_header((DATA_STREAM_HEADER, DATA_STREAM_VERSION))
            .append_header(("Cache-Control", "no-cache"))
            .streaming(async_stream::stream! {
                let mut count = 0usize;
                while let Some(part) = parts.next().await {
                    count += 1;
                    yield Ok::<_, actix_web::Error>(Bytes::from(encode_part(&part)));
                }
                debug!("[{}] Stream complete after {} parts", request_id, count);
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    #[actix_web::test]
    async fn failures_become_json_500() {
        let response = ResponseTranslator::translate(
            "req",
            RequestOutcome::ConnectionFailure("connection refused".to_string()),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "MCP Client Error: connection refused");
    }

    #[actix_web::test]
    async fn generation_failure_keeps_reason() {
        let response = ResponseTranslator::translate(
            "req",
            RequestOutcome::GenerationFailure("Authentication error: missing key".to_string()),
        );
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Authentication error: missing key");
    }
}
