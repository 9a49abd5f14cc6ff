use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use page_time_machine::build_router;
use page_time_machine::config::Args;
use page_time_machine::llm::{AnthropicClient, ModelRouter, OpenAiClient};
use page_time_machine::state::AppState;
use page_time_machine::store::{MemoryStore, PageStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,page_time_machine=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let args = Args::parse();

    let backend = ModelRouter {
        openai: args.openai_api_key.clone().map(OpenAiClient::new),
        anthropic: args.anthropic_api_key.clone().map(AnthropicClient::new),
        google: args.google_api_key.clone().map(OpenAiClient::google),
    };
    let providers = backend.configured_providers();
    if providers.is_empty() {
        tracing::warn!("no model API keys configured, every generation will fail");
    } else {
        tracing::info!(?providers, "model providers configured");
    }
    if !providers.contains(&args.default_model.provider()) {
        tracing::warn!(model = %args.default_model, "default model has no API key configured");
    }

    let store: Arc<dyn PageStore> = match &args.redis_url {
        Some(url) => {
            tracing::info!("page history stored in redis");
            Arc::new(RedisStore::open(url).context("Invalid REDIS_URL")?)
        }
        None => {
            tracing::warn!("REDIS_URL not set, page history kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    // creating shared state
    let state = Arc::new(AppState {
        backend: Arc::new(backend),
        store,
        default_model: args.default_model,
        max_duration: args.max_duration(),
        smoothing_delay: args.smoothing_delay(),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Gateway running on http://localhost:{}", args.port);
    tracing::info!("Default model: {}", args.default_model);
    tracing::info!("Execution limit: {} seconds", args.max_duration);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
