use clap::Parser;
use std::io;

use agent_llm::ProviderSettings;
use agent_server::logging::init_logging;
use agent_server::{run_server, ServerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "agent-server")]
#[command(about = "Streaming chat bridge with MCP tools")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = agent_server::config::DEFAULT_PORT)]
    port: u16,

    /// SSE endpoint of the MCP tool server
    #[arg(long, env = "MCP_SERVER_URL", default_value = agent_server::config::DEFAULT_MCP_SERVER_URL)]
    mcp_server_url: String,

    /// LLM provider (gemini or openai)
    #[arg(long, env = "LLM_PROVIDER", default_value = "gemini")]
    provider: String,

    /// LLM model name; the provider default when unset
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// LLM API base URL; the provider default when unset
    #[arg(long, env = "LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Bound on opening the MCP session, in milliseconds
    #[arg(long, env = "MCP_CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    connect_timeout_ms: u64,

    /// Bound on each MCP request, in milliseconds
    #[arg(long, env = "MCP_REQUEST_TIMEOUT_MS", default_value_t = 60_000)]
    request_timeout_ms: u64,

    /// Bound on one whole generation, in seconds
    #[arg(long, env = "GENERATION_TIMEOUT_SECS", default_value_t = 300)]
    generation_timeout_secs: u64,

    /// Model calls per request; tool results feed the next call
    #[arg(long, env = "GENERATION_MAX_STEPS", default_value_t = 1)]
    max_steps: usize,

    /// Cap on generated tokens per model call
    #[arg(long, env = "MAX_OUTPUT_TOKENS")]
    max_output_tokens: Option<u32>,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let mut api_key = self.api_key;
        if api_key.is_empty() {
            // Key name used by Google's own SDKs.
            api_key = std::env::var("GOOGLE_GENERATIVE_AI_API_KEY").unwrap_or_default();
        }

        ServerConfig {
            port: self.port,
            mcp_server_url: self.mcp_server_url,
            provider: ProviderSettings {
                provider: self.provider,
                model: self.model,
                base_url: self.llm_base_url,
                api_key,
            },
            connect_timeout_ms: self.connect_timeout_ms,
            request_timeout_ms: self.request_timeout_ms,
            generation_timeout_secs: self.generation_timeout_secs,
            max_steps: self.max_steps,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = cli.into_config();
    tracing::info!("Starting agent server on port {}", config.port);
    tracing::debug!(
        "Server configuration: {}",
        serde_json::to_string(&config).unwrap_or_default()
    );

    run_server(config).await
}
