use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the Tenderscout ingestion pipeline.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores dense vectors.
    pub qdrant_url: String,
    /// Name of the Qdrant collection backing dense retrieval.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Path of the SQLite file holding the lexical store and document cache.
    pub lexical_db_path: String,
    /// Base URL of the embedding provider (OpenAI-compatible surface).
    pub embedding_base_url: String,
    /// Optional bearer token for the embedding provider.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Number of chunk texts submitted per embedding request.
    pub embedding_batch_size: usize,
    /// Optional dimension hint used when the provider response is empty.
    pub embedding_dimension_hint: Option<usize>,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Character overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            lexical_db_path: load_env_optional("LEXICAL_DB_PATH")
                .unwrap_or_else(|| "tenderscout.db".to_string()),
            embedding_base_url: load_env("EMBEDDING_BASE_URL")?,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_batch_size: parse_optional("EMBEDDING_BATCH_SIZE")?.unwrap_or(32),
            embedding_dimension_hint: parse_optional("EMBEDDING_DIMENSION")?,
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(500),
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(100),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        lexical_db = %config.lexical_db_path,
        embedding_model = %config.embedding_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
