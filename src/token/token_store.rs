use super::grants::Grant;
use anyhow::Result;
use serde::Serialize;

/// Stored metadata of an issued token. The bearer string itself is never
/// persisted. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityToken {
    pub id: i64,
    pub identifier: String,
    pub grants: Vec<Grant>,
    pub expiration: Option<i64>,
    pub created_at: i64,
    pub last_used_at: Option<i64>,
}

pub trait TokenStore: Send + Sync {
    /// Inserts a token row and returns its id.
    /// Fails if the identifier is already taken.
    fn create_token(
        &self,
        identifier: &str,
        grants: &[Grant],
        expiration: Option<i64>,
        created_at: i64,
    ) -> Result<i64>;

    /// Returns Ok(None) if no token has this identifier.
    fn get_token_by_identifier(&self, identifier: &str) -> Result<Option<CapabilityToken>>;

    fn list_tokens(&self) -> Result<Vec<CapabilityToken>>;

    /// Updates the grants of an existing token. Returns false if it does not exist.
    fn update_grants(&self, id: i64, grants: &[Grant]) -> Result<bool>;

    fn touch_last_used(&self, identifier: &str, at: i64) -> Result<()>;

    /// Hard-deletes a token. Returns false if the id is unknown.
    fn delete_token(&self, id: i64) -> Result<bool>;
}
