use clap::Parser;
use std::time::Duration;

use crate::models::SupportedModel;

// CLI argument structure. Secrets come from the environment (or a .env file).
#[derive(Parser, Debug, Clone)]
#[command(name = "page-time-machine")]
#[command(about = "Streams LLM-regenerated web pages for a given year and keeps a short history")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Model used when a request does not name one
    #[arg(long, env = "DEFAULT_MODEL", default_value = "claude-3.7", value_parser = parse_model)]
    pub default_model: SupportedModel,

    // Upper bound on one request, stream included, in seconds
    #[arg(long, default_value_t = 60)]
    pub max_duration: u64,

    // Pause between smoothed word chunks, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub smoothing_delay_ms: u64,

    // Page history store; in-memory when unset
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    pub redis_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
}

impl Args {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration)
    }

    pub fn smoothing_delay(&self) -> Duration {
        Duration::from_millis(self.smoothing_delay_ms)
    }
}

fn parse_model(s: &str) -> Result<SupportedModel, String> {
    s.parse()
}
