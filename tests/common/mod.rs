//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient};
//!
//! #[tokio::test]
//! async fn test_initialize() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::with_grants(server.base_url.clone(), "ide", &["LIVE_API"]).await;
//!
//!     let envelope = client.rpc("initialize", serde_json::json!({})).await;
//!     assert_eq!(envelope["result"]["protocolVersion"], "2025-06-18");
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
