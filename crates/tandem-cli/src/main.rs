use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{InMemoryConversationStore, InMemoryMemoryStore};
use tandem_gateway::{ConnectionManager, GatewayServer};
use tandem_provider::{ProviderRouter, ProviderSettings};
use tandem_tools::ToolRegistry;
use tandem_turn::{GenerationSettings, TurnOrchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", about = "Tandem — LLM conversation engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "tandem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the built-in tools
    Tools,
    /// List models offered by the configured providers
    Models,
}

#[derive(Deserialize, Default)]
struct TandemConfig {
    #[serde(default)]
    provider: ProviderSettings,
    #[serde(default)]
    server: ServerConfig,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_heartbeat_secs")]
    heartbeat_secs: u64,
    #[serde(default = "default_tool_timeout_secs")]
    tool_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            heartbeat_secs: default_heartbeat_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_tool_timeout_secs() -> u64 {
    30
}

/// Loads config from the file when present, falling back to defaults.
/// Credentials absent from the file are taken from the environment.
async fn load_config(path: &PathBuf) -> anyhow::Result<TandemConfig> {
    let mut config = match tokio::fs::read_to_string(path).await {
        Ok(text) => toml::from_str(&text).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?,
        Err(_) => TandemConfig::default(),
    };

    let env = ProviderSettings::from_env();
    if config.provider.openai_api_key.is_none() {
        config.provider.openai_api_key = env.openai_api_key;
    }
    if config.provider.openai_base_url.is_none() {
        config.provider.openai_base_url = env.openai_base_url;
    }
    if config.provider.anthropic_api_key.is_none() {
        config.provider.anthropic_api_key = env.anthropic_api_key;
    }
    if config.provider.anthropic_base_url.is_none() {
        config.provider.anthropic_base_url = env.anthropic_base_url;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            info!("Starting Tandem gateway on {}:{}", host, port);

            let router = Arc::new(ProviderRouter::from_settings(&config.provider));
            if router.available_models().is_empty() {
                info!("No provider credentials configured; turns will report errors");
            }

            let tools = Arc::new(ToolRegistry::with_builtins());
            let settings = GenerationSettings {
                default_model: config.provider.default_model.clone(),
                temperature: config.provider.temperature,
                max_tokens: config.provider.max_tokens,
                tool_timeout: Duration::from_secs(config.server.tool_timeout_secs),
            };
            let orchestrator = Arc::new(
                TurnOrchestrator::new(
                    router,
                    tools,
                    Arc::new(InMemoryConversationStore::new()),
                    Arc::new(InMemoryMemoryStore::new()),
                )
                .with_settings(settings),
            );

            let connections = ConnectionManager::new();
            connections.spawn_heartbeat(Duration::from_secs(config.server.heartbeat_secs));

            let app = GatewayServer::build(orchestrator, connections);

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Tandem gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Tools => {
            let tools = ToolRegistry::with_builtins();
            let specs = tools.specs_for("").await;
            if specs.is_empty() {
                println!("No tools registered.");
            } else {
                println!("Built-in tools:");
                for spec in &specs {
                    println!("  {} — {}", spec.name, spec.description);
                }
                println!("\nTotal: {} tool(s)", specs.len());
            }
        }
        Commands::Models => {
            let router = ProviderRouter::from_settings(&config.provider);
            let listings = router.available_models();
            if listings.is_empty() {
                println!("No providers configured.");
                println!("Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or add keys to tandem.toml");
            } else {
                for listing in &listings {
                    println!("{} (default: {})", listing.provider, listing.default_model);
                    for model in &listing.models {
                        println!("  {model}");
                    }
                }
            }
        }
    }

    Ok(())
}
