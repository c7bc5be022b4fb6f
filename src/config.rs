use serde::Deserialize;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/v1/llm";
const DEFAULT_LLM_MAX_TOKENS: u32 = 512;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SERVER_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_DOCS_ROOT: &str = "documents";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Rusty RAG pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime used by the `ollama` provider.
    pub ollama_url: String,
    /// Upper bound on a single embedding request, in seconds.
    pub embedding_timeout_secs: u64,
    /// API key for the answer backend; the local stub answers when absent.
    pub llm_api_key: Option<String>,
    /// Endpoint receiving `{prompt, max_tokens}` answer requests.
    pub llm_api_url: String,
    /// Token budget forwarded to the answer backend.
    pub llm_max_tokens: u32,
    /// Upper bound on a single answer backend request, in seconds.
    pub llm_timeout_secs: u64,
    /// Address the HTTP server binds to.
    pub server_host: IpAddr,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Directory the HTTP surface may read documents from.
    pub docs_root: PathBuf,
}

/// Supported embedding backends for the retrieval pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic in-process hashing embedder.
    Hash,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = match load_env_optional("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            None => EmbeddingProvider::Hash,
        };

        let embedding_dimension =
            parse_optional("EMBEDDING_DIMENSION")?.unwrap_or(DEFAULT_EMBEDDING_DIMENSION);
        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }

        Ok(Self {
            embedding_provider,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension,
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            embedding_timeout_secs: parse_optional("EMBEDDING_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_EMBEDDING_TIMEOUT_SECS),
            llm_api_key: load_env_optional("LLM_API_KEY")
                .or_else(|| load_env_optional("GROQ_API_KEY")),
            llm_api_url: load_env_optional("LLM_API_URL")
                .or_else(|| load_env_optional("GROQ_API_URL"))
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_max_tokens: parse_optional("LLM_MAX_TOKENS")?.unwrap_or(DEFAULT_LLM_MAX_TOKENS),
            llm_timeout_secs: parse_optional("LLM_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            server_host: parse_optional("SERVER_HOST")?.unwrap_or(DEFAULT_SERVER_HOST),
            server_port: parse_optional("SERVER_PORT")?,
            docs_root: load_env_optional("DOCS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCS_ROOT)),
        })
    }

    /// Request timeout applied to the answer backend.
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs.max(1))
    }

    /// Request timeout applied to the embedding backend.
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Hash,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_timeout_secs: DEFAULT_EMBEDDING_TIMEOUT_SECS,
            llm_api_key: None,
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_max_tokens: DEFAULT_LLM_MAX_TOKENS,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            server_host: DEFAULT_SERVER_HOST,
            server_port: None,
            docs_root: PathBuf::from(DEFAULT_DOCS_ROOT),
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        llm_backend = config.llm_api_key.is_some(),
        server_host = %config.server_host,
        server_port = ?config.server_port,
        docs_root = %config.docs_root.display(),
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
