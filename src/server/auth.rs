//! Bearer extraction and the authorization prefilters of the gateway.

use axum::{
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::state::ServerState;
use crate::config::GatewayConfig;
use crate::mcp::{McpError, McpRegistry, McpRequest};
use crate::token::{is_tool_allowed, TokenError, TokenService, ValidatedToken};

/// Headers that may carry the bearer, in the order they are tried. Reverse
/// proxies and CGI redirects rename the original `Authorization` header.
pub const BEARER_HEADERS: [&str; 3] = [
    "authorization",
    "x-forwarded-authorization",
    "redirect-http-authorization",
];

lazy_static! {
    static ref BEARER_REGEX: Regex =
        Regex::new(r"(?i)^Bearer\s+(.*?)$").expect("Failed to compile bearer regex");
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("MCP server is disabled")]
    Disabled,
    #[error("Missing bearer token")]
    MissingToken,
    #[error(transparent)]
    InvalidToken(TokenError),
    #[error("Token has no grant for tool '{0}'")]
    Forbidden(String),
}

impl From<AuthError> for McpError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Disabled => McpError::Disabled,
            AuthError::MissingToken => McpError::Unauthorized(err.to_string()),
            AuthError::InvalidToken(TokenError::Storage(e)) => {
                McpError::InternalError(e.to_string())
            }
            AuthError::InvalidToken(e) => McpError::Unauthorized(e.to_string()),
            AuthError::Forbidden(tool) => McpError::PermissionDenied(tool),
        }
    }
}

/// The bearer string of the first header in [`BEARER_HEADERS`] that is
/// present, if it has the `Bearer <token>` shape.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = BEARER_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))?
        .to_str()
        .ok()?;
    BEARER_REGEX
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Runs the prefilter chain: gateway enabled, valid token, then the grant of
/// the called tool. The first failing stage wins.
pub fn authorize(
    gateway: &GatewayConfig,
    token_service: &TokenService,
    registry: &McpRegistry,
    headers: &HeaderMap,
    request: &McpRequest,
) -> Result<ValidatedToken, AuthError> {
    if !gateway.enabled {
        return Err(AuthError::Disabled);
    }

    let bearer = extract_bearer(headers).ok_or(AuthError::MissingToken)?;
    let token = token_service
        .validate(&bearer)
        .map_err(AuthError::InvalidToken)?;

    if let Some(tool_name) = called_tool(request) {
        // Unknown tools fall through so dispatch can report them.
        if registry.get_tool(&tool_name).is_some() && !is_tool_allowed(&tool_name, &token.grants)
        {
            debug!("Token {} lacks the grant for {}", token.identifier, tool_name);
            return Err(AuthError::Forbidden(tool_name));
        }
    }

    Ok(token)
}

fn called_tool(request: &McpRequest) -> Option<String> {
    if request.method != crate::mcp::protocol::methods::TOOLS_CALL {
        return None;
    }
    request
        .params
        .as_ref()?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Access to the `/v1/internal` routes, granted by the configured admin key.
#[derive(Debug)]
pub struct AdminAccess;

pub enum AdminAccessError {
    NotConfigured,
    AccessDenied,
}

impl IntoResponse for AdminAccessError {
    fn into_response(self) -> Response {
        match self {
            AdminAccessError::NotConfigured | AdminAccessError::AccessDenied => {
                StatusCode::FORBIDDEN.into_response()
            }
        }
    }
}

impl FromRequestParts<ServerState> for AdminAccess {
    type Rejection = AdminAccessError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = match &ctx.config.admin_key {
            Some(key) => key,
            None => {
                debug!("Internal route called but no admin key is configured");
                return Err(AdminAccessError::NotConfigured);
            }
        };
        match extract_bearer(&parts.headers) {
            Some(bearer) if bearer == *admin_key => Ok(AdminAccess),
            _ => Err(AdminAccessError::AccessDenied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn extracts_bearer_from_authorization() {
        let map = headers(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(extract_bearer(&map).as_deref(), Some("abc.def.ghi"));

        let map = headers(&[("authorization", "bearer   lower")]);
        assert_eq!(extract_bearer(&map).as_deref(), Some("lower"));
    }

    #[test]
    fn falls_back_to_proxy_headers_in_order() {
        let map = headers(&[
            ("redirect-http-authorization", "Bearer from-cgi"),
            ("x-forwarded-authorization", "Bearer from-proxy"),
        ]);
        assert_eq!(extract_bearer(&map).as_deref(), Some("from-proxy"));

        let map = headers(&[("redirect-http-authorization", "Bearer from-cgi")]);
        assert_eq!(extract_bearer(&map).as_deref(), Some("from-cgi"));
    }

    #[test]
    fn first_present_header_wins_even_if_malformed() {
        let map = headers(&[
            ("authorization", "Basic dXNlcjpwYXNz"),
            ("x-forwarded-authorization", "Bearer from-proxy"),
        ]);
        assert_eq!(extract_bearer(&map), None);
    }

    #[test]
    fn rejects_missing_or_empty_bearer() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers(&[("authorization", "Bearer ")])), None);
    }

    #[test]
    fn maps_auth_errors_to_internal_error_code() {
        let errors = vec![
            AuthError::Disabled,
            AuthError::MissingToken,
            AuthError::InvalidToken(TokenError::Expired),
            AuthError::Forbidden("sql".to_string()),
        ];
        for err in errors {
            assert_eq!(McpError::from(err).code(), -32603);
        }
        assert_eq!(
            McpError::from(AuthError::InvalidToken(TokenError::Expired)).message(),
            "Unauthorized: Token has expired"
        );
    }
}
