mod auth;
pub mod config;
mod http_layers;
mod internal_routes;
mod rpc;
pub mod server;
pub mod state;

pub use auth::{extract_bearer, AuthError, BEARER_HEADERS};
pub use config::ServerConfig;
pub use http_layers::*;
pub use rpc::EXCHANGE_LOG_TARGET;
pub use server::{make_app, run_server};
pub use state::ServerState;
