//! Administrative routes under `/v1/internal`, guarded by the admin key.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::error;

use super::auth::AdminAccess;
use super::state::{GuardedLiveApi, GuardedTokenService, ServerState};
use crate::token::TokenError;

#[derive(Deserialize, Debug)]
struct ReindexBody {
    #[serde(default)]
    start: usize,
    limit: usize,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IssueTokenBody {
    identifier: String,
    #[serde(default)]
    grants: Vec<String>,
    ttl_seconds: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct GrantsBody {
    grants: Vec<String>,
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    error!("Internal route failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}

fn token_error_response(err: TokenError) -> Response {
    match err {
        TokenError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        err if err.is_validation() => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        err => internal_error(err),
    }
}

async fn post_reindex(
    _admin: AdminAccess,
    State(live_api): State<GuardedLiveApi>,
    Json(body): Json<ReindexBody>,
) -> Response {
    let ReindexBody { start, limit } = body;
    let result = tokio::task::spawn_blocking(move || live_api.reindex(start, limit)).await;
    match result {
        Ok(Ok(progress)) => Json(progress).into_response(),
        Ok(Err(err)) => internal_error(err),
        Err(err) => internal_error(err),
    }
}

async fn get_index_status(_admin: AdminAccess, State(live_api): State<GuardedLiveApi>) -> Response {
    match live_api.status() {
        Ok(status) => Json(status).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn post_token(
    _admin: AdminAccess,
    State(token_service): State<GuardedTokenService>,
    Json(body): Json<IssueTokenBody>,
) -> Response {
    match token_service.issue(&body.identifier, &body.grants, body.ttl_seconds) {
        Ok(issued) => (StatusCode::CREATED, Json(issued)).into_response(),
        Err(err) => token_error_response(err),
    }
}

async fn get_tokens(
    _admin: AdminAccess,
    State(token_service): State<GuardedTokenService>,
) -> Response {
    match token_service.list() {
        Ok(tokens) => Json(tokens).into_response(),
        Err(err) => token_error_response(err),
    }
}

async fn delete_token(
    _admin: AdminAccess,
    State(token_service): State<GuardedTokenService>,
    Path(id): Path<i64>,
) -> Response {
    match token_service.revoke(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => token_error_response(err),
    }
}

async fn put_token_grants(
    _admin: AdminAccess,
    State(token_service): State<GuardedTokenService>,
    Path(id): Path<i64>,
    Json(body): Json<GrantsBody>,
) -> Response {
    match token_service.set_grants(id, &body.grants) {
        Ok(grants) => Json(grants).into_response(),
        Err(err) => token_error_response(err),
    }
}

pub fn make_internal_routes(state: ServerState) -> Router {
    Router::new()
        .route("/live-api/reindex", post(post_reindex))
        .route("/live-api/status", get(get_index_status))
        .route("/tokens", post(post_token))
        .route("/tokens", get(get_tokens))
        .route("/tokens/{id}", delete(delete_token))
        .route("/tokens/{id}/grants", put(put_token_grants))
        .with_state(state)
}
