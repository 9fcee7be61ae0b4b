//! `POST /mcp`: JSON-RPC transport around the MCP dispatcher.

use axum::{body::Bytes, extract::State, http::header::HeaderMap, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::auth::authorize;
use super::state::ServerState;
use crate::config::GatewayConfig;
use crate::mcp::{handle_request, McpError, McpRequest, McpResponse, RequestId, ToolContext};

pub const EXCHANGE_LOG_TARGET: &str = "mcp_exchange";
const NO_TOKEN_TAG: &str = "-";

pub async fn handle_mcp(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<McpResponse> {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            debug!("Rejecting unparsable MCP body: {}", err);
            let text = String::from_utf8_lossy(&body);
            log_exchange(&state.gateway, "in", NO_TOKEN_TAG, &text);
            let response = McpResponse::error(None, McpError::ParseError);
            return finalize(&state.gateway, NO_TOKEN_TAG, response);
        }
    };
    let id = recover_id(&raw);

    let request: McpRequest = match serde_json::from_value(raw.clone()) {
        Ok(request) if raw.is_object() => request,
        _ => {
            log_exchange(&state.gateway, "in", NO_TOKEN_TAG, &raw);
            let response = McpResponse::error(id, McpError::ParseError);
            return finalize(&state.gateway, NO_TOKEN_TAG, response);
        }
    };

    let token = match authorize(
        &state.gateway,
        &state.token_service,
        &state.mcp_state.registry,
        &headers,
        &request,
    ) {
        Ok(token) => token,
        Err(err) => {
            info!("MCP request '{}' rejected: {}", request.method, err);
            log_exchange(&state.gateway, "in", NO_TOKEN_TAG, &raw);
            let response = McpResponse::error(id, err.into());
            return finalize(&state.gateway, NO_TOKEN_TAG, response);
        }
    };
    log_exchange(&state.gateway, "in", &token.identifier, &raw);

    let tag = token.identifier.clone();
    let ctx = ToolContext::new(token.identifier, token.grants, state.services.clone());
    let response = match handle_request(&request, ctx, &state.mcp_state).await {
        Ok(result) => McpResponse::success(id, result),
        Err(err) => {
            debug!("MCP method '{}' failed: {}", request.method, err.message());
            McpResponse::error(id, err)
        }
    };
    finalize(&state.gateway, &tag, response)
}

/// The request id, if the payload carries a usable one.
fn recover_id(raw: &Value) -> Option<RequestId> {
    raw.get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok())
}

fn finalize(gateway: &GatewayConfig, tag: &str, response: McpResponse) -> Json<McpResponse> {
    log_exchange(gateway, "out", tag, &response);
    Json(response)
}

/// Emits one payload on the exchange log. Never fails the request.
fn log_exchange<T: Serialize + ?Sized>(
    gateway: &GatewayConfig,
    direction: &str,
    tag: &str,
    payload: &T,
) {
    if !gateway.log_exchanges {
        return;
    }
    match serde_json::to_string(payload) {
        Ok(text) => info!(target: EXCHANGE_LOG_TARGET, token = tag, direction, "{}", text),
        Err(err) => warn!(target: EXCHANGE_LOG_TARGET, token = tag, "Unloggable payload: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recovers_numeric_and_string_ids() {
        assert_eq!(recover_id(&json!({"id": 7})), Some(RequestId::Number(7)));
        assert_eq!(
            recover_id(&json!({"id": "abc"})),
            Some(RequestId::String("abc".to_string()))
        );
        assert_eq!(recover_id(&json!({"id": {"nested": true}})), None);
        assert_eq!(recover_id(&json!([1, 2])), None);
    }
}
