use actix_web::{web, HttpResponse, ResponseError};
use agent_core::ChatRequest;
use uuid::Uuid;

use crate::error::RequestError;
use crate::response::ResponseTranslator;
use crate::state::AppState;

/// POST /api/chat
///
/// The body is decoded by hand so a malformed payload gets the same JSON
/// error shape as every other failure.
pub async fn handler(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request_id = Uuid::new_v4().to_string();

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = RequestError::InvalidRequest(e.to_string());
            tracing::warn!(stage = error.stage(), "[{}] {}", request_id, error);
            return error.error_response();
        }
    };

    let outcome = state.controller.handle(&request_id, request).await;
    ResponseTranslator::translate(&request_id, outcome)
}
