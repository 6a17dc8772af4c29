use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

/// Process configuration, read once at startup.
///
/// Required keys fail fast via [`Config::from_env`] so the server never
/// starts half-configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Directory of CSV datasets, loaded once at startup.
    pub data_path: PathBuf,
    /// Directory where generated charts and table exports land.
    pub output_dir: PathBuf,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint base, including the `/v1` segment
    /// (e.g. `https://api.openai.com/v1`, `http://localhost:11434/v1`).
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8000),
            log_level: env_or("LOG_LEVEL", "info"),
            data_path: PathBuf::from(env_required("DATA_PATH")?),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "output")),
            llm: LlmConfig {
                base_url: env_required("LLM_BASE_URL")?,
                model: env_required("LLM_MODEL")?,
                api_key: env_required("LLM_API_KEY")?,
            },
        })
    }

    /// Print a redacted summary for startup logs. Never logs the API key.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:  {}:{}", self.host, self.port);
        tracing::info!("  data:    path={}", self.data_path.display());
        tracing::info!("  output:  dir={}", self.output_dir.display());
        tracing::info!(
            "  llm:     model={}, base_url={}, api_key={}",
            self.llm.model,
            self.llm.base_url,
            if self.llm.api_key.is_empty() { "(empty)" } else { "(set)" }
        );
    }
}

impl LlmConfig {
    /// Keyless local endpoints (Ollama) reject an empty bearer token but
    /// accept any placeholder.
    pub fn effective_api_key(&self) -> &str {
        if self.api_key.is_empty() {
            "ollama"
        } else {
            &self.api_key
        }
    }
}
