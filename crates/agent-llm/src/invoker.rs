//! Streaming generation with tool execution.
//!
//! [`GenerationInvoker::invoke`] validates its inputs, spawns one generation
//! task and hands back a [`GenerationStream`] right away. The task relays
//! provider output as [`StreamPart`]s, runs tool calls through a
//! [`ToolExecutor`] and reports how it ended through a completion callback
//! that fires exactly once.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use agent_core::tools::{parse_tool_args, ToolCall, ToolCallAccumulator, ToolExecutor};
use agent_core::{Message, Role};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::provider::{LLMError, LLMProvider, Result};
use crate::types::{FinishReason, LLMChunk, TokenUsage};

/// One element of a generation's output, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    StartStep {
        message_id: String,
    },
    TextDelta(String),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    FinishStep {
        finish_reason: FinishReason,
        usage: TokenUsage,
        is_continued: bool,
    },
    Finish {
        finish_reason: FinishReason,
        usage: TokenUsage,
    },
    Error(String),
}

/// How a generation task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    Finished,
    Failed(String),
    /// The reader dropped the stream before generation finished.
    Cancelled,
    TimedOut,
}

pub type OnComplete = Box<dyn FnOnce(CompletionStatus) + Send + 'static>;

#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
    /// Model calls per generation; tool results feed the next one.
    pub max_steps: usize,
    pub generation_timeout: Duration,
    pub channel_capacity: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_output_tokens: None,
            max_steps: 1,
            generation_timeout: Duration::from_secs(300),
            channel_capacity: 64,
        }
    }
}

/// Receiving half of a generation. Finite and single-use.
pub struct GenerationStream {
    rx: mpsc::Receiver<StreamPart>,
}

impl GenerationStream {
    /// Drain the stream into a vector.
    pub async fn collect_parts(mut self) -> Vec<StreamPart> {
        let mut parts = Vec::new();
        while let Some(part) = self.next().await {
            parts.push(part);
        }
        parts
    }
}

impl Stream for GenerationStream {
    type Item = StreamPart;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Fires the completion callback on drop if the task never reported.
struct CompletionGuard {
    callback: Option<OnComplete>,
}

impl CompletionGuard {
    fn new(callback: OnComplete) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    fn complete(mut self, status: CompletionStatus) {
        if let Some(callback) = self.callback.take() {
            callback(status);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(CompletionStatus::Failed(
                "generation task ended before completing".to_string(),
            ));
        }
    }
}

/// Why the generation loop stopped early.
enum Interrupted {
    Cancelled,
    Failed(String),
}

pub struct GenerationInvoker {
    provider: Arc<dyn LLMProvider>,
    config: InvokerConfig,
}

impl GenerationInvoker {
    pub fn new(provider: Arc<dyn LLMProvider>, config: InvokerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Start a generation.
    ///
    /// Rejections happen here, before anything is spawned, and leave
    /// `on_complete` uncalled. Once a stream is returned `on_complete` is
    /// called exactly once. Must be called within a tokio runtime.
    pub fn invoke(
        &self,
        messages: Vec<Message>,
        tools: Arc<dyn ToolExecutor>,
        on_complete: OnComplete,
    ) -> Result<GenerationStream> {
        validate_messages(&messages)?;
        self.provider.check_config()?;
        if self.config.max_steps == 0 {
            return Err(LLMError::InvalidRequest(
                "max_steps must be at least 1".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let guard = CompletionGuard::new(on_complete);
        let provider = self.provider.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let timeout = config.generation_timeout;
            let run = run_generation(provider.as_ref(), &config, messages, tools.as_ref(), &tx);

            let status = tokio::select! {
                biased;
                _ = tx.closed() => CompletionStatus::Cancelled,
                outcome = tokio::time::timeout(timeout, run) => match outcome {
                    Ok(Ok(())) => CompletionStatus::Finished,
                    Ok(Err(Interrupted::Cancelled)) => CompletionStatus::Cancelled,
                    Ok(Err(Interrupted::Failed(reason))) => {
                        log::warn!("Generation failed: {}", reason);
                        // Outside the timeout; a stalled reader must not hold completion.
                        if tx.try_send(StreamPart::Error(reason.clone())).is_err() {
                            log::debug!("Reader not draining, error part dropped");
                        }
                        CompletionStatus::Failed(reason)
                    }
                    Err(_) => {
                        log::warn!("Generation timed out after {:?}", timeout);
                        // The reader may be stalled; don't wait on it.
                        let _ = tx.try_send(StreamPart::Error(format!(
                            "Generation timed out after {}s",
                            timeout.as_secs()
                        )));
                        CompletionStatus::TimedOut
                    }
                },
            };

            log::debug!("Generation ended: {:?}", status);
            guard.complete(status);
        });

        Ok(GenerationStream { rx })
    }
}

fn validate_messages(messages: &[Message]) -> Result<()> {
    if messages.is_empty() {
        return Err(LLMError::InvalidRequest(
            "conversation has no messages".to_string(),
        ));
    }

    for (index, message) in messages.iter().enumerate() {
        if message.role == Role::Tool
            && message
                .tool_call_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty())
        {
            return Err(LLMError::InvalidRequest(format!(
                "tool message at index {} has no tool_call_id",
                index
            )));
        }
    }

    Ok(())
}

async fn emit(
    tx: &mpsc::Sender<StreamPart>,
    part: StreamPart,
) -> std::result::Result<(), Interrupted> {
    tx.send(part).await.map_err(|_| Interrupted::Cancelled)
}

async fn run_generation(
    provider: &dyn LLMProvider,
    config: &InvokerConfig,
    mut history: Vec<Message>,
    tools: &dyn ToolExecutor,
    tx: &mpsc::Sender<StreamPart>,
) -> std::result::Result<(), Interrupted> {
    let schemas = tools.list_tools();
    let mut total_usage = TokenUsage::default();

    for step in 0..config.max_steps {
        emit(
            tx,
            StreamPart::StartStep {
                message_id: format!("msg-{}", uuid::Uuid::new_v4().simple()),
            },
        )
        .await?;

        log::debug!(
            "Generation step {} with {} messages and {} tools",
            step + 1,
            history.len(),
            schemas.len()
        );

        let mut stream = provider
            .chat_stream(
                &history,
                &schemas,
                config.max_output_tokens,
                config.model.as_deref(),
            )
            .await
            .map_err(|e| Interrupted::Failed(e.to_string()))?;

        let mut text = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        let mut reported_finish = None;
        let mut usage = TokenUsage::default();

        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|e| Interrupted::Failed(e.to_string()))? {
                LLMChunk::Token(token) => {
                    if !token.is_empty() {
                        text.push_str(&token);
                        emit(tx, StreamPart::TextDelta(token)).await?;
                    }
                }
                LLMChunk::ToolCalls(calls) => accumulator.extend(calls),
                // Providers report running totals; keep the latest.
                LLMChunk::Usage(latest) => usage = latest,
                LLMChunk::Finish(reason) => reported_finish = Some(reason),
                LLMChunk::Done => break,
            }
        }
        drop(stream);

        let calls = accumulator.finalize();
        let mut tool_turns = Vec::with_capacity(calls.len());

        for call in &calls {
            emit(
                tx,
                StreamPart::ToolCall {
                    tool_call_id: call.id.clone(),
                    tool_name: call.function.name.clone(),
                    args: parse_tool_args(&call.function.arguments)
                        .unwrap_or_else(|_| Value::String(call.function.arguments.clone())),
                },
            )
            .await?;
        }

        for call in &calls {
            let (result, content) = execute_tool(tools, call).await;
            emit(
                tx,
                StreamPart::ToolResult {
                    tool_call_id: call.id.clone(),
                    result,
                },
            )
            .await?;
            tool_turns.push(Message::tool_result(call.id.clone(), content));
        }

        total_usage += usage;
        let finish_reason = if calls.is_empty() {
            reported_finish.unwrap_or(FinishReason::Stop)
        } else {
            FinishReason::ToolCalls
        };
        let continues = !calls.is_empty() && step + 1 < config.max_steps;

        emit(
            tx,
            StreamPart::FinishStep {
                finish_reason,
                usage,
                is_continued: false,
            },
        )
        .await?;

        if !continues {
            emit(
                tx,
                StreamPart::Finish {
                    finish_reason,
                    usage: total_usage,
                },
            )
            .await?;
            return Ok(());
        }

        history.push(Message::assistant(text, Some(calls)));
        history.extend(tool_turns);
    }

    Ok(())
}

/// Run one tool call. Failures are reported back to the model, not raised.
async fn execute_tool(tools: &dyn ToolExecutor, call: &ToolCall) -> (Value, String) {
    match tools.execute(call).await {
        Ok(outcome) if outcome.success => (Value::String(outcome.result.clone()), outcome.result),
        Ok(outcome) => (
            json!({ "error": outcome.result }),
            format!("Error: {}", outcome.result),
        ),
        Err(e) => {
            log::warn!("Tool '{}' failed: {}", call.function.name, e);
            (json!({ "error": e.to_string() }), format!("Error: {}", e))
        }
    }
}
