//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint. When routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client, optionally carrying a capability token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Bearer sent on `/mcp` calls
    pub token: Option<String>,
    next_id: std::sync::atomic::AtomicI64,
}

impl TestClient {
    /// Creates a client without a capability token
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }

    /// Issues a token with `grants` through the internal route and returns a
    /// client that sends it
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be issued (indicates test infrastructure problem).
    pub async fn with_grants(base_url: String, identifier: &str, grants: &[&str]) -> Self {
        let mut client = Self::new(base_url);
        let response = client.issue_token(identifier, grants, None).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Token issue failed: {:?}",
            response.text().await
        );
        let body: Value = response.json().await.expect("Token response is not JSON");
        client.token = body["token"].as_str().map(str::to_string);
        client
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // MCP Gateway
    // ========================================================================

    /// POSTs a raw body to `/mcp` with the client's token, if any
    pub async fn post_mcp_raw(&self, body: String) -> Response {
        let mut request = self
            .client
            .post(format!("{}/mcp", self.base_url))
            .header("content-type", "application/json")
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("MCP request failed")
    }

    /// Sends one JSON-RPC call with `id` and returns the parsed envelope
    pub async fn rpc_with_id(&self, id: Value, method: &str, params: Value) -> Value {
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self.post_mcp_raw(body.to_string()).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("MCP response is not JSON")
    }

    /// Sends one JSON-RPC call with a fresh numeric id
    pub async fn rpc(&self, method: &str, params: Value) -> Value {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let envelope = self.rpc_with_id(json!(id), method, params).await;
        assert_eq!(envelope["id"], id, "Response id does not echo the request");
        envelope
    }

    pub async fn list_tool_names(&self) -> Vec<String> {
        let envelope = self.rpc("tools/list", json!({})).await;
        envelope["result"]["tools"]
            .as_array()
            .unwrap_or_else(|| panic!("No tools in {}", envelope))
            .iter()
            .map(|tool| tool["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        self.rpc("tools/call", json!({"name": name, "arguments": arguments}))
            .await
    }

    // ========================================================================
    // Internal Routes
    // ========================================================================

    fn internal(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/v1/internal{}", self.base_url, path))
            .bearer_auth(ADMIN_KEY)
    }

    pub async fn issue_token(
        &self,
        identifier: &str,
        grants: &[&str],
        ttl_seconds: Option<u64>,
    ) -> Response {
        self.internal(reqwest::Method::POST, "/tokens")
            .json(&json!({
                "identifier": identifier,
                "grants": grants,
                "ttlSeconds": ttl_seconds,
            }))
            .send()
            .await
            .expect("Issue token request failed")
    }

    pub async fn list_tokens(&self) -> Response {
        self.internal(reqwest::Method::GET, "/tokens")
            .send()
            .await
            .expect("List tokens request failed")
    }

    pub async fn revoke_token(&self, id: i64) -> Response {
        self.internal(reqwest::Method::DELETE, &format!("/tokens/{}", id))
            .send()
            .await
            .expect("Revoke token request failed")
    }

    pub async fn set_token_grants(&self, id: i64, grants: &[&str]) -> Response {
        self.internal(reqwest::Method::PUT, &format!("/tokens/{}/grants", id))
            .json(&json!({"grants": grants}))
            .send()
            .await
            .expect("Set grants request failed")
    }

    pub async fn reindex(&self, start: usize, limit: usize) -> Response {
        self.internal(reqwest::Method::POST, "/live-api/reindex")
            .json(&json!({"start": start, "limit": limit}))
            .send()
            .await
            .expect("Reindex request failed")
    }

    /// Drives batches of `limit` until every module is processed
    pub async fn reindex_all(&self, limit: usize) {
        let mut done = 0;
        loop {
            let response = self.reindex(done, limit).await;
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            let progress: Value = response.json().await.expect("Reindex response is not JSON");
            done += progress["processed"].as_u64().unwrap_or(0) as usize;
            let total = progress["total"].as_u64().unwrap_or(0) as usize;
            if done >= total {
                break;
            }
        }
    }

    pub async fn index_status(&self) -> Response {
        self.internal(reqwest::Method::GET, "/live-api/status")
            .send()
            .await
            .expect("Index status request failed")
    }
}
