//! Deployment configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional TOML
//! file, then `SEMPRINT_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemprintError};
use crate::types::{IndexKind, MetricType};

const CONFIG_ENV: &str = "SEMPRINT_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "semprint.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub logging: LoggingConfig,
}

/// Where the vector index service lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 19121,
        }
    }
}

impl StoreConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Index parameters fixed at collection creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Vector width; must equal the embedding model's hidden size.
    pub dimension: usize,
    pub metric: MetricType,
    pub index_kind: IndexKind,
    /// Number of IVF clusters (`nlist`).
    pub cluster_count: usize,
    /// Size in MB of a single index data file.
    pub index_file_size: usize,
    /// Number of clusters scanned per query (`nprobe`).
    pub search_breadth: usize,
    pub max_top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 1024,
            metric: MetricType::InnerProduct,
            index_kind: IndexKind::IvfSq8,
            cluster_count: 4096,
            index_file_size: 1024,
            search_breadth: 128,
            max_top_k: 16384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the text-embeddings-inference server.
    pub url: String,
    pub max_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            max_length: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, `$SEMPRINT_CONFIG`, or `./semprint.toml`,
    /// falling back to defaults when no file is found, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var(CONFIG_ENV)
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                    p.exists().then_some(p)
                }),
        };

        let mut config = match file {
            Some(p) => Self::from_file(&p)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| SemprintError::Config(e.to_string()))
    }

    /// Apply `SEMPRINT_*` overrides. `lookup` is injectable so tests need not
    /// touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SEMPRINT_STORE_HOST") {
            self.store.host = v;
        }
        if let Some(v) = lookup("SEMPRINT_STORE_PORT") {
            self.store.port = parse_env("SEMPRINT_STORE_PORT", &v)?;
        }
        if let Some(v) = lookup("SEMPRINT_DIMENSION") {
            self.index.dimension = parse_env("SEMPRINT_DIMENSION", &v)?;
        }
        if let Some(v) = lookup("SEMPRINT_SEARCH_BREADTH") {
            self.index.search_breadth = parse_env("SEMPRINT_SEARCH_BREADTH", &v)?;
        }
        if let Some(v) = lookup("SEMPRINT_EMBEDDING_URL") {
            self.embedding.url = v;
        }
        if let Some(v) = lookup("SEMPRINT_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("SEMPRINT_LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.host.trim().is_empty() {
            return Err(SemprintError::Config("store.host must not be empty".into()));
        }
        if self.index.dimension == 0 {
            return Err(SemprintError::Config("index.dimension must be > 0".into()));
        }
        if self.index.cluster_count == 0 {
            return Err(SemprintError::Config(
                "index.cluster_count must be > 0".into(),
            ));
        }
        if self.index.search_breadth == 0 || self.index.search_breadth > self.index.cluster_count
        {
            return Err(SemprintError::Config(format!(
                "index.search_breadth must be in 1..={}, got {}",
                self.index.cluster_count, self.index.search_breadth
            )));
        }
        if self.index.index_kind == IndexKind::Other {
            return Err(SemprintError::Config(
                "index.index_kind must be one of FLAT, IVFFLAT, IVFSQ8, IVFPQ".into(),
            ));
        }
        if self.index.max_top_k == 0 {
            return Err(SemprintError::Config("index.max_top_k must be > 0".into()));
        }
        if self.embedding.max_length < 2 {
            return Err(SemprintError::Config(
                "embedding.max_length must leave room for special tokens".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SemprintError::Config(format!("invalid value for {key}: {value:?}")))
}
