mod file_config;

pub use file_config::{
    DocsFileConfig, EmbeddingFileConfig, FileConfig, GatewayFileConfig, HostFileConfig,
};

use crate::host::HostConfig;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_EMBEDDING_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_PHP_BINARY: &str = "php";
pub const DEFAULT_SERVER_NAME: &str = "Bitrix LiveAPI MCP";

/// Crate version plus the git hash it was built from.
pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub document_root: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub embedding_url: String,
    pub embedding_timeout_sec: u64,
    pub docs_dir: Option<PathBuf>,
    pub embeddings_file: Option<PathBuf>,
    pub admin_key: Option<String>,
    pub log_exchanges: bool,
    pub php_binary: String,
    pub sql_database: Option<PathBuf>,
    pub disabled: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            document_root: None,
            port: DEFAULT_PORT,
            logging_level: RequestsLoggingLevel::default(),
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            embedding_timeout_sec: DEFAULT_EMBEDDING_TIMEOUT_SEC,
            docs_dir: None,
            embeddings_file: None,
            admin_key: None,
            log_exchanges: false,
            php_binary: DEFAULT_PHP_BINARY.to_string(),
            sql_database: None,
            disabled: false,
        }
    }
}

/// Immutable settings of the protocol gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub log_exchanges: bool,
    pub server_name: String,
    pub server_version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_exchanges: false,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            server_version: server_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub document_root: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub admin_key: Option<String>,

    // Feature configs (with defaults)
    pub gateway: GatewayConfig,
    pub embedding: EmbeddingConfig,
    pub docs_dir: PathBuf,
    pub embeddings_file: PathBuf,
    pub host: HostConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let document_root = file
            .document_root
            .map(PathBuf::from)
            .or_else(|| cli.document_root.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "document_root must be specified via --document-root or in config file"
                )
            })?;
        if !document_root.is_dir() {
            bail!("Document root is not a directory: {:?}", document_root);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let admin_key = file
            .admin_key
            .or_else(|| cli.admin_key.clone())
            .filter(|key| !key.is_empty());

        let gateway_file = file.gateway.unwrap_or_default();
        let gateway = GatewayConfig {
            enabled: gateway_file.enabled.unwrap_or(!cli.disabled),
            log_exchanges: gateway_file.log_exchanges.unwrap_or(cli.log_exchanges),
            server_name: gateway_file
                .server_name
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            server_version: server_version(),
        };

        let embedding_file = file.embedding.unwrap_or_default();
        let embedding = EmbeddingConfig {
            base_url: embedding_file
                .url
                .unwrap_or_else(|| cli.embedding_url.clone()),
            timeout: Duration::from_secs(
                embedding_file
                    .timeout_sec
                    .unwrap_or(cli.embedding_timeout_sec),
            ),
        };

        let docs_file = file.docs.unwrap_or_default();
        let docs_dir = docs_file
            .dir
            .map(PathBuf::from)
            .or_else(|| cli.docs_dir.clone())
            .unwrap_or_else(|| db_dir.join("docs"));
        let embeddings_file = docs_file
            .embeddings_file
            .map(PathBuf::from)
            .or_else(|| cli.embeddings_file.clone())
            .unwrap_or_else(|| db_dir.join("embeddings.json"));

        let host_file = file.host.unwrap_or_default();
        let host = HostConfig {
            document_root: document_root.clone(),
            php_binary: host_file
                .php_binary
                .unwrap_or_else(|| cli.php_binary.clone()),
            sql_database: host_file
                .sql_database
                .map(PathBuf::from)
                .or_else(|| cli.sql_database.clone()),
        };

        Ok(Self {
            db_dir,
            document_root,
            port,
            logging_level,
            admin_key,
            gateway,
            embedding,
            docs_dir,
            embeddings_file,
            host,
        })
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }

    pub fn token_db_path(&self) -> PathBuf {
        self.db_dir.join("tokens.db")
    }

    pub fn live_api_db_path(&self) -> PathBuf {
        self.db_dir.join("live_api.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
