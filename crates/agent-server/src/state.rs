use std::sync::Arc;
use std::time::Duration;

use agent_llm::{create_provider, GenerationInvoker, LLMError};
use agent_mcp::{SseConnector, ToolProviderConnector};

use crate::config::ServerConfig;
use crate::controller::RequestLifecycleController;

pub struct AppState {
    pub controller: RequestLifecycleController,
}

impl AppState {
    pub fn new(connector: Arc<dyn ToolProviderConnector>, invoker: Arc<GenerationInvoker>) -> Self {
        Self {
            controller: RequestLifecycleController::new(connector, invoker),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, LLMError> {
        tracing::info!(
            "Creating LLM provider: {} (model: {})",
            config.provider.provider,
            config.provider.model.as_deref().unwrap_or("default")
        );
        let provider = create_provider(&config.provider)?;
        let invoker = Arc::new(GenerationInvoker::new(provider, config.invoker_config()));

        tracing::info!("Tool provider: {}", config.mcp_server_url);
        let connector = Arc::new(SseConnector::new(config.mcp_config()));

        let controller = RequestLifecycleController::new(connector, invoker)
            .with_discovery_timeout(Duration::from_millis(config.request_timeout_ms));

        Ok(Self { controller })
    }
}
