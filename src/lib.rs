//! Bitrix LiveAPI MCP Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod docs;
pub mod embedding;
pub mod host;
pub mod index_store;
pub mod live_api;
pub mod mcp;
pub mod pagination;
pub mod server;
pub mod server_store;
pub mod sqlite_persistence;
pub mod token;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerState};
pub use server_store::{ServerStore, SqliteServerStore};
pub use token::{Grant, TokenService};
