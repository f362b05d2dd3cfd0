/*
newsjacker - single-binary main.rs
This binary loads configuration, builds the generation client and starts the Rocket HTTP adapter.
*/

use anyhow::Context;
use clap::Parser;
use common::{Config, LlmConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsjacker::llm::anthropic::AnthropicProvider;
use newsjacker::llm::remote::RemoteLlmProvider;
use newsjacker::llm::LlmProvider;
use newsjacker::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "newsjacker", about = "Headline-grounded title and brief generator")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fetch the configured feeds before serving
    #[arg(long)]
    fetch_on_start: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    config.validate()?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let llm_provider: Option<Arc<dyn LlmProvider>> = match config.llm.as_ref() {
        Some(llm_config) => match create_llm_provider(llm_config) {
            Ok(provider) => Some(Arc::from(provider)),
            Err(e) => {
                error!("Failed to initialize LLM provider: {:#}", e);
                None
            }
        },
        None => {
            warn!("No [llm] section configured; title and brief generation are disabled");
            None
        }
    };

    let config = Arc::new(config);
    let mut state = AppState::new(config.clone(), llm_provider)?;

    if args.fetch_on_start {
        let urls = config.feed_urls();
        let count = state
            .newsroom
            .get_mut()
            .refresh(&state.aggregator, &urls, config.feeds.limit_per_feed)
            .await;
        info!("Initial fetch: {} headlines from {} feeds", count, urls.len());
    }

    launch_rocket(state).await?;

    info!("Shutdown complete");
    Ok(())
}

/// Create an LLM provider based on configuration. The API key is read here, from the
/// environment variable named in config, and handed to the provider.
fn create_llm_provider(llm_config: &LlmConfig) -> anyhow::Result<Box<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("anthropic");
    let endpoint = llm_config
        .endpoint()
        .ok_or_else(|| anyhow::anyhow!("No [llm.{}] section configured", adapter))?;

    let api_key_env = endpoint
        .api_key_env
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in llm config"))?;
    let api_key = std::env::var(api_key_env)
        .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

    let timeout_secs = endpoint.timeout_seconds.unwrap_or(60);

    match adapter {
        "anthropic" => {
            let mut provider = AnthropicProvider::new(api_key).with_timeout(timeout_secs);
            if let Some(api_url) = &endpoint.api_url {
                provider = provider.with_api_url(api_url);
            }
            if let Some(model) = &endpoint.model {
                provider = provider.with_model(model);
            }
            info!(
                "LLM provider initialized: anthropic ({})",
                endpoint.model.as_deref().unwrap_or(newsjacker::llm::anthropic::DEFAULT_MODEL)
            );
            Ok(Box::new(provider))
        }
        "remote" => {
            let model = endpoint.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = endpoint
                .api_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());
            info!("LLM provider initialized: remote ({}) at {}", model, api_url);
            let provider = RemoteLlmProvider::new(api_url, api_key, model).with_timeout(timeout_secs);
            Ok(Box::new(provider))
        }
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}
