use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub document_root: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub admin_key: Option<String>,

    // Feature configs
    pub gateway: Option<GatewayFileConfig>,
    pub embedding: Option<EmbeddingFileConfig>,
    pub docs: Option<DocsFileConfig>,
    pub host: Option<HostFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GatewayFileConfig {
    pub enabled: Option<bool>,
    pub log_exchanges: Option<bool>,
    pub server_name: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EmbeddingFileConfig {
    pub url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DocsFileConfig {
    pub dir: Option<String>,
    pub embeddings_file: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct HostFileConfig {
    pub php_binary: Option<String>,
    pub sql_database: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
