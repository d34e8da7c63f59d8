//! Per-request lifecycle: connect, discover, generate, clean up.
//!
//! The controller owns the tool-provider connection for the length of one
//! chat request. Each failure is turned into a [`RequestOutcome`] at the
//! stage it happened, and the connection is closed exactly once whichever
//! way the request ends.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{tools::ToolExecutor, ChatRequest};
use agent_llm::{CompletionStatus, GenerationInvoker, GenerationStream};
use agent_mcp::{ToolProviderConnector, ToolSet};
use tracing::{debug, info, warn};

use crate::error::RequestError;
use crate::lease::ConnectionLease;

/// Result of driving one chat request up to the point of streaming.
pub enum RequestOutcome {
    StreamedSuccess(GenerationStream),
    ConnectionFailure(String),
    DiscoveryFailure(String),
    GenerationFailure(String),
}

impl RequestOutcome {
    /// The caller-facing error, `None` for a stream.
    pub fn error(&self) -> Option<RequestError> {
        match self {
            RequestOutcome::StreamedSuccess(_) => None,
            RequestOutcome::ConnectionFailure(reason) => {
                Some(RequestError::Connection(reason.clone()))
            }
            RequestOutcome::DiscoveryFailure(reason) => {
                Some(RequestError::Discovery(reason.clone()))
            }
            RequestOutcome::GenerationFailure(reason) => {
                Some(RequestError::Generation(reason.clone()))
            }
        }
    }
}

impl std::fmt::Debug for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestOutcome::StreamedSuccess(_) => write!(f, "StreamedSuccess(..)"),
            RequestOutcome::ConnectionFailure(r) => write!(f, "ConnectionFailure({:?})", r),
            RequestOutcome::DiscoveryFailure(r) => write!(f, "DiscoveryFailure({:?})", r),
            RequestOutcome::GenerationFailure(r) => write!(f, "GenerationFailure({:?})", r),
        }
    }
}

const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RequestLifecycleController {
    connector: Arc<dyn ToolProviderConnector>,
    invoker: Arc<GenerationInvoker>,
    discovery_timeout: Duration,
}

impl RequestLifecycleController {
    pub fn new(connector: Arc<dyn ToolProviderConnector>, invoker: Arc<GenerationInvoker>) -> Self {
        Self {
            connector,
            invoker,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    /// Bound on the whole tool listing, across every page.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub async fn handle(&self, request_id: &str, request: ChatRequest) -> RequestOutcome {
        let messages = request.into_messages();
        debug!("[{}] Chat request with {} messages", request_id, messages.len());

        let connection = match self.connector.open().await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(stage = "connect", "[{}] Failed to open tool provider: {}", request_id, e);
                return RequestOutcome::ConnectionFailure(e.to_string());
            }
        };
        let lease = Arc::new(ConnectionLease::new(request_id, connection));

        let discovery = tokio::time::timeout(
            self.discovery_timeout,
            ToolSet::discover(lease.connection()),
        );
        let tools = match discovery.await {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                warn!(stage = "discover", "[{}] Tool discovery failed: {}", request_id, e);
                lease.release().await;
                return RequestOutcome::DiscoveryFailure(e.to_string());
            }
            Err(_) => {
                let reason = format!(
                    "tool discovery timed out after {}ms",
                    self.discovery_timeout.as_millis()
                );
                warn!(stage = "discover", "[{}] {}", request_id, reason);
                lease.release().await;
                return RequestOutcome::DiscoveryFailure(reason);
            }
        };
        info!(
            "[{}] Discovered {} tools: {:?}",
            request_id,
            tools.len(),
            tools.names().collect::<Vec<_>>()
        );

        let on_complete = {
            let lease = lease.clone();
            let request_id = request_id.to_string();
            Box::new(move |status: CompletionStatus| {
                match &status {
                    CompletionStatus::Finished => {
                        info!("[{}] Generation finished", request_id)
                    }
                    CompletionStatus::Cancelled => {
                        info!("[{}] Client went away, generation cancelled", request_id)
                    }
                    CompletionStatus::TimedOut => {
                        warn!(stage = "generate", "[{}] Generation timed out", request_id)
                    }
                    CompletionStatus::Failed(reason) => {
                        warn!(stage = "generate", "[{}] Generation failed: {}", request_id, reason)
                    }
                }
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move { lease.release().await });
                    }
                    // Dropping the lease is the fallback close.
                    Err(_) => drop(lease),
                }
            })
        };

        let tools: Arc<dyn ToolExecutor> = Arc::new(tools);
        match self.invoker.invoke(messages, tools, on_complete) {
            Ok(stream) => {
                debug!("[{}] Streaming generation", request_id);
                RequestOutcome::StreamedSuccess(stream)
            }
            Err(e) => {
                warn!(stage = "generate", "[{}] Generation rejected: {}", request_id, e);
                lease.release().await;
                RequestOutcome::GenerationFailure(e.to_string())
            }
        }
    }
}
