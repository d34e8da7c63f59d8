//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures_util::{stream, StreamExt};
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        LLMError::Stream(msg) => LLMError::Stream(msg),
        other => LLMError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` receives the SSE event name and data payload for each event and
/// returns the chunks it decodes to (possibly none). An `Err` is emitted as a
/// stream error (mapped to `LLMError::Stream`).
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Vec<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| -> Vec<Result<LLMChunk>> {
            let event = match event {
                Ok(event) => event,
                Err(e) => return vec![Err(LLMError::Stream(e.to_string()))],
            };
            match handler(event.event.as_str(), event.data.as_str()) {
                Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(to_stream_error(err))],
            }
        })
        .flat_map(stream::iter);

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sse_response(body: &'static str) -> (MockServer, Response) {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", mock_server.uri()))
            .send()
            .await
            .expect("response");

        (mock_server, response)
    }

    #[tokio::test]
    async fn llm_stream_from_sse_flattens_and_passes_event_name_and_data() {
        let (_server, response) = sse_response(concat!(
            "event: token\n",
            "data: hello\n",
            "\n",
            "event: token\n",
            "data: skip\n",
            "\n",
            "data: two\n",
            "\n",
        ))
        .await;

        let mut stream = llm_stream_from_sse(response, |event, data| match data {
            "skip" => Ok(vec![]),
            "two" => Ok(vec![
                LLMChunk::Token("a".to_string()),
                LLMChunk::Token("b".to_string()),
            ]),
            _ => Ok(vec![LLMChunk::Token(format!("{event}:{data}"))]),
        });

        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.expect("chunk"));
        }

        assert_eq!(
            out,
            vec![
                LLMChunk::Token("token:hello".to_string()),
                LLMChunk::Token("a".to_string()),
                LLMChunk::Token("b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn llm_stream_from_sse_maps_handler_errors_to_stream_error() {
        let (_server, response) = sse_response(concat!("event: token\n", "data: boom\n", "\n")).await;

        let mut stream = llm_stream_from_sse(response, |_event, _data| {
            Err(LLMError::Api("boom".to_string()))
        });

        let Some(item) = stream.next().await else {
            panic!("expected one stream item");
        };

        match item {
            Ok(chunk) => panic!("expected error, got chunk: {chunk:?}"),
            Err(LLMError::Stream(msg)) => assert!(msg.contains("API error")),
            Err(other) => panic!("expected LLMError::Stream, got: {other:?}"),
        }
    }
}
