use anyhow::{Context, Result};
use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::{AppConfig, GatewayConfig};
use crate::docs::{DocsLibrary, DocsSearch};
use crate::embedding::EmbeddingClient;
use crate::index_store::SqliteIndexStore;
use crate::live_api::LiveApiService;
use crate::mcp::{create_mcp_state, McpServices, McpState};
use crate::server_store::{ServerStore, SqliteServerStore, NEED_TO_REINDEX_KEY};
use crate::token::{SqliteTokenStore, TokenSecret, TokenService};

use super::ServerConfig;

pub type GuardedTokenService = Arc<TokenService>;
pub type GuardedMcpState = Arc<McpState>;
pub type GuardedLiveApi = Arc<LiveApiService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub gateway: GatewayConfig,
    pub start_time: Instant,
    pub token_service: GuardedTokenService,
    pub mcp_state: GuardedMcpState,
    pub services: McpServices,
}

impl ServerState {
    /// Opens the databases below `db_dir` and wires every service.
    pub fn from_config(app_config: &AppConfig) -> Result<ServerState> {
        info!("Opening server state database...");
        let server_store: Arc<dyn ServerStore> = Arc::new(
            SqliteServerStore::new(app_config.server_db_path())
                .context("Failed to open server state database")?,
        );

        info!("Opening token database...");
        let token_store = Arc::new(
            SqliteTokenStore::new(app_config.token_db_path())
                .context("Failed to open token database")?,
        );
        let secret = TokenSecret::load_or_create(server_store.as_ref())?;
        let token_service = Arc::new(TokenService::new(token_store, secret));

        info!("Opening LiveAPI index database...");
        let index_store = SqliteIndexStore::new(app_config.live_api_db_path())
            .context("Failed to open LiveAPI index database")?;
        if index_store.was_created() {
            info!("LiveAPI index created from scratch, a reindex is needed");
            server_store.set_state(NEED_TO_REINDEX_KEY, "Y")?;
        }
        let live_api = Arc::new(LiveApiService::new(
            app_config.document_root.clone(),
            Arc::new(index_store),
            server_store.clone(),
        ));

        let services = McpServices {
            live_api,
            docs: Arc::new(DocsLibrary::new(app_config.docs_dir.clone())),
            docs_search: Arc::new(DocsSearch::new(app_config.embeddings_file.clone())),
            embeddings: Arc::new(EmbeddingClient::new(
                app_config.embedding.base_url.clone(),
                app_config.embedding.timeout,
            )),
            host: app_config.host.clone(),
        };

        let mcp_state = Arc::new(create_mcp_state(
            &app_config.gateway.server_name,
            &app_config.gateway.server_version,
        ));

        Ok(ServerState {
            config: ServerConfig {
                requests_logging_level: app_config.logging_level.clone(),
                port: app_config.port,
                admin_key: app_config.admin_key.clone(),
            },
            gateway: app_config.gateway.clone(),
            start_time: Instant::now(),
            token_service,
            mcp_state,
            services,
        })
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GatewayConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.gateway.clone()
    }
}

impl FromRef<ServerState> for GuardedTokenService {
    fn from_ref(input: &ServerState) -> Self {
        input.token_service.clone()
    }
}

impl FromRef<ServerState> for GuardedMcpState {
    fn from_ref(input: &ServerState) -> Self {
        input.mcp_state.clone()
    }
}

impl FromRef<ServerState> for GuardedLiveApi {
    fn from_ref(input: &ServerState) -> Self {
        input.services.live_api.clone()
    }
}

impl FromRef<ServerState> for McpServices {
    fn from_ref(input: &ServerState) -> Self {
        input.services.clone()
    }
}
