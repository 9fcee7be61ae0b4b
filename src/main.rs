use anyhow::{Context, Result};
use bx_mcp_server::config::{AppConfig, CliConfig, FileConfig};
use bx_mcp_server::server::{run_server, RequestsLoggingLevel, ServerState};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding server.db, tokens.db and live_api.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Document root of the Bitrix installation.
    #[clap(long, value_parser = parse_path)]
    pub document_root: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Base URL of the embedding microservice.
    #[clap(long, default_value = "http://127.0.0.1:8000")]
    pub embedding_url: String,

    /// Timeout in seconds for embedding requests.
    #[clap(long, default_value_t = 30)]
    pub embedding_timeout_sec: u64,

    /// Directory of Markdown documentation pages. Defaults to <db-dir>/docs.
    #[clap(long, value_parser = parse_path)]
    pub docs_dir: Option<PathBuf>,

    /// Precomputed documentation chunk vectors. Defaults to <db-dir>/embeddings.json.
    #[clap(long, value_parser = parse_path)]
    pub embeddings_file: Option<PathBuf>,

    /// Bearer key of the /v1/internal routes. Without it they answer 403.
    #[clap(long)]
    pub admin_key: Option<String>,

    /// Log every MCP request and response on the `mcp_exchange` target.
    #[clap(long)]
    pub log_exchanges: bool,

    /// PHP interpreter used by the eval tool.
    #[clap(long, default_value = "php")]
    pub php_binary: String,

    /// SQLite database queried by the sql tool.
    #[clap(long, value_parser = parse_path)]
    pub sql_database: Option<PathBuf>,

    /// Start with the MCP gateway disabled.
    #[clap(long)]
    pub disabled: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            document_root: self.document_root.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            embedding_url: self.embedding_url.clone(),
            embedding_timeout_sec: self.embedding_timeout_sec,
            docs_dir: self.docs_dir.clone(),
            embeddings_file: self.embeddings_file.clone(),
            admin_key: self.admin_key.clone(),
            log_exchanges: self.log_exchanges,
            php_binary: self.php_binary.clone(),
            sql_database: self.sql_database.clone(),
            disabled: self.disabled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!(
        "Starting {} {} (document root {:?}, databases in {:?})",
        app_config.gateway.server_name,
        app_config.gateway.server_version,
        app_config.document_root,
        app_config.db_dir
    );
    if !app_config.gateway.enabled {
        info!("MCP gateway is disabled, every protocol call will be rejected");
    }
    if app_config.admin_key.is_none() {
        info!("No admin key configured, internal routes are closed");
    }

    let state = ServerState::from_config(&app_config)?;
    run_server(state).await
}
