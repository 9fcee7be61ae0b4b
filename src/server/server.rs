use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use super::internal_routes::make_internal_routes;
use super::rpc::handle_mcp;
use super::{log_requests, state::ServerState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerStats {
    pub name: String,
    pub version: String,
    pub uptime: String,
    pub indexed_modules: usize,
    pub need_to_reindex: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let (indexed_modules, need_to_reindex) = match state.services.live_api.status() {
        Ok(status) => (
            status.stat.map(|s| s.modules_count).unwrap_or(0),
            status.need_to_reindex,
        ),
        Err(err) => {
            warn!("Could not read index status: {}", err);
            (0, true)
        }
    };
    let stats = ServerStats {
        name: state.gateway.server_name.clone(),
        version: state.gateway.server_version.clone(),
        uptime: format_uptime(state.start_time.elapsed()),
        indexed_modules,
        need_to_reindex,
    };
    Json(stats)
}

pub fn make_app(state: ServerState) -> Router {
    let home_router: Router = Router::new()
        .route("/", get(home))
        .route("/mcp", post(handle_mcp))
        .with_state(state.clone());

    home_router
        .nest("/v1/internal", make_internal_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, CliConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    const ADMIN_KEY: &str = "admin-secret";

    fn make_state(admin_key: Option<&str>, disabled: bool) -> (ServerState, TempDir) {
        let temp = TempDir::new().unwrap();
        let db_dir = temp.path().join("db");
        let site = temp.path().join("site");
        fs::create_dir_all(&db_dir).unwrap();
        let module = site.join("local/modules/vendor.demo");
        fs::create_dir_all(module.join("install")).unwrap();
        fs::create_dir_all(module.join("lib")).unwrap();
        fs::write(
            module.join("install/version.php"),
            "<?php $arModuleVersion = ['VERSION' => '2.0.1'];",
        )
        .unwrap();
        fs::write(
            module.join("lib/helper.php"),
            "<?php\nfunction demo_helper($value)\n{\n    return $value;\n}\n",
        )
        .unwrap();

        let cli = CliConfig {
            db_dir: Some(db_dir),
            document_root: Some(site),
            embedding_url: "http://127.0.0.1:9".to_string(),
            admin_key: admin_key.map(str::to_string),
            disabled,
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None).unwrap();
        (ServerState::from_config(&config).unwrap(), temp)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn rpc(body: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json");
        if let Some(bearer) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", bearer));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn home_reports_index_state() {
        let (state, _temp) = make_state(None, false);
        let app = make_app(state);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Bitrix LiveAPI MCP");
        assert_eq!(body["indexedModules"], 0);
        assert_eq!(body["needToReindex"], true);
    }

    #[tokio::test]
    async fn parse_error_has_null_id() {
        let (state, _temp) = make_state(None, false);
        let app = make_app(state);
        let (status, body) = send(&app, rpc("{not json", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn auth_failure_echoes_id() {
        let (state, _temp) = make_state(None, false);
        let app = make_app(state);
        let request = r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#;

        let (_, body) = send(&app, rpc(request, None)).await;
        assert_eq!(body["id"], 7);
        assert_eq!(body["error"]["code"], -32603);

        let (_, body) = send(&app, rpc(request, Some("garbage"))).await;
        assert_eq!(body["id"], 7);
        assert_eq!(body["error"]["code"], -32603);
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn disabled_gateway_rejects_before_token_check() {
        let (state, _temp) = make_state(None, true);
        let issued = state
            .token_service
            .issue("ci", &["SQL".to_string()], None)
            .unwrap();
        let app = make_app(state);
        let request = r#"{"jsonrpc":"2.0","id":"a","method":"initialize"}"#;
        let (_, body) = send(&app, rpc(request, Some(&issued.token))).await;
        assert_eq!(body["id"], "a");
        assert_eq!(body["error"]["message"], "MCP server is disabled");
    }

    #[tokio::test]
    async fn tool_call_without_grant_is_rejected() {
        let (state, _temp) = make_state(None, false);
        let issued = state
            .token_service
            .issue("ci", &["LIVE_API".to_string()], None)
            .unwrap();
        let app = make_app(state);

        let request = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"exec","arguments":{"command":"id"}}}"#;
        let (_, body) = send(&app, rpc(request, Some(&issued.token))).await;
        assert_eq!(body["id"], 3);
        assert_eq!(body["error"]["code"], -32603);
        assert_eq!(body["error"]["message"], "Token has no grant for tool 'exec'");

        let request = r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope"}}"#;
        let (_, body) = send(&app, rpc(request, Some(&issued.token))).await;
        assert_eq!(body["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn initialize_and_unknown_method() {
        let (state, _temp) = make_state(None, false);
        let issued = state.token_service.issue("ci", &[], None).unwrap();
        let app = make_app(state);

        let request = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let (_, body) = send(&app, rpc(request, Some(&issued.token))).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], "2025-06-18");
        assert_eq!(body["result"]["serverInfo"]["name"], "Bitrix LiveAPI MCP");

        let request = r#"{"jsonrpc":"2.0","id":2,"method":"resources/templates"}"#;
        let (_, body) = send(&app, rpc(request, Some(&issued.token))).await;
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(
            body["error"]["message"],
            "Method not found: 'resources/templates'"
        );
    }

    #[tokio::test]
    async fn internal_routes_need_admin_key() {
        let (state, _temp) = make_state(None, false);
        let app = make_app(state);
        let request = Request::builder()
            .uri("/v1/internal/tokens")
            .header("authorization", "Bearer anything")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (state, _temp) = make_state(Some(ADMIN_KEY), false);
        let app = make_app(state);
        let request = Request::builder()
            .uri("/v1/internal/tokens")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_reindex_and_status() {
        let (state, _temp) = make_state(Some(ADMIN_KEY), false);
        let app = make_app(state);

        let request = Request::builder()
            .method("POST")
            .uri("/v1/internal/live-api/reindex")
            .header("authorization", format!("Bearer {}", ADMIN_KEY))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"start":0,"limit":10}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"total": 1, "processed": 1}));

        let request = Request::builder()
            .uri("/v1/internal/live-api/status")
            .header("authorization", format!("Bearer {}", ADMIN_KEY))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["needToReindex"], false);
        assert_eq!(body["functions"], 1);
    }

    #[tokio::test]
    async fn internal_token_lifecycle() {
        let (state, _temp) = make_state(Some(ADMIN_KEY), false);
        let app = make_app(state);
        let auth = format!("Bearer {}", ADMIN_KEY);

        let request = Request::builder()
            .method("POST")
            .uri("/v1/internal/tokens")
            .header("authorization", &auth)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"identifier":"ide","grants":["SQL","BOGUS"]}"#))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("POST")
            .uri("/v1/internal/tokens")
            .header("authorization", &auth)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"identifier":"ide","grants":["SQL"]}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["identifier"], "ide");
        let id = body["id"].as_i64().unwrap();
        assert!(!body["token"].as_str().unwrap().is_empty());

        let request = Request::builder()
            .uri("/v1/internal/tokens")
            .header("authorization", &auth)
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, request).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert!(body[0].get("token").is_none());

        for expected in [StatusCode::NO_CONTENT, StatusCode::NOT_FOUND] {
            let request = Request::builder()
                .method("DELETE")
                .uri(format!("/v1/internal/tokens/{}", id))
                .header("authorization", &auth)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), expected);
        }
    }
}
