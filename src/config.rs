use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILENAME: &str = "insights_config.toml";
pub const CONFIG_PATH_ENV: &str = "INSIGHTS_CONFIG_PATH";
const ENV_PREFIX: &str = "INSIGHTS_";

pub const DEFAULT_COLLECTION_NAME: &str = "csv_embeddings";
pub const DEFAULT_EMBEDDING_DIM: u64 = 384;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    #[serde(rename = "qdrant")]
    Qdrant,
    #[serde(rename = "memory")]
    Memory,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    #[serde(rename = "fastembed")]
    FastEmbed,
    #[serde(rename = "hashing")]
    Hashing,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    /// gRPC endpoint of the Qdrant server.
    pub url: String,
    pub collection_name: String,
    pub dimension: u64,
    /// Drop and recreate an existing collection at startup. Discards every stored exchange.
    #[serde(default)]
    pub recreate_on_startup: bool,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            url: "http://localhost:6334".to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            dimension: DEFAULT_EMBEDDING_DIM,
            recreate_on_startup: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let default_cache_dir = ProjectDirs::from("io", "csv-insights", "csv-insights")
            .map(|dirs| dirs.cache_dir().join("models"));
        Self {
            provider: EmbeddingProvider::FastEmbed,
            cache_dir: default_cache_dir,
        }
    }
}

/// Names of the two columns the yearly aggregation reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    pub date_field: String,
    pub sales_field: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            date_field: "release_date".to_string(),
            sales_field: "total_sales".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QueryConfig {
    /// Number of similar past exchanges added to each prompt.
    pub top_k: usize,
    /// Number of leading rows rendered into the prompt's data sample.
    pub sample_rows: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            sample_rows: 50,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GenerationConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "models/gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            max_output_tokens: 500,
            timeout_secs: 60,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StorageConfig {
    /// JSON-lines file receiving the query history. Kept in memory when unset.
    #[serde(default)]
    pub history_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InsightsConfig {
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Loads configuration from defaults, the TOML file and `INSIGHTS_*` env vars, in that order.
pub fn load_config() -> Result<InsightsConfig> {
    let config_path_env = std::env::var(CONFIG_PATH_ENV).ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow::anyhow!(
                "Config file not found at {}: {}",
                CONFIG_PATH_ENV,
                env_path
            ));
        }
        log::info!("{} is set: {}", CONFIG_PATH_ENV, env_path);
    } else {
        log::info!("{} not set, falling back to default: {}", CONFIG_PATH_ENV, config_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(InsightsConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: InsightsConfig = figment
        .extract()
        .context("Failed to extract InsightsConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &InsightsConfig) -> Result<()> {
    if config.vector_store.collection_name.trim().is_empty() {
        return Err(anyhow::anyhow!("vector_store.collection_name cannot be empty"));
    }
    if config.vector_store.dimension == 0 {
        return Err(anyhow::anyhow!("vector_store.dimension must be greater than zero"));
    }
    if config.query.top_k == 0 {
        return Err(anyhow::anyhow!("query.top_k must be greater than zero"));
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        return Err(anyhow::anyhow!(
            "generation.temperature must be within [0, 2], got {}",
            config.generation.temperature
        ));
    }
    if let Some(path) = &config.storage.history_path {
        if path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Configured storage.history_path cannot be empty"));
        }
    }
    Ok(())
}
