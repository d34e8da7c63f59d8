//! Shared helpers for provider implementations.

pub mod openai_compat;
pub mod sse;

/// Map a non-success HTTP status to an [`LLMError`](crate::LLMError).
pub(crate) fn status_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> crate::LLMError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        crate::LLMError::Auth(format!(
            "{} authentication failed: {}. Please check your API key.",
            provider, body
        ))
    } else {
        crate::LLMError::Api(format!("{} API error: HTTP {}: {}", provider, status, body))
    }
}
