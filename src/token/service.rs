use super::grants::Grant;
use super::token_store::{CapabilityToken, TokenStore};
use crate::server_store::{ServerStore, JWT_SECRET_KEY};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const MAX_IDENTIFIER_LEN: usize = 255;
const SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token identifier must not be empty")]
    EmptyIdentifier,
    #[error("Token identifier must be at most 255 characters")]
    IdentifierTooLong,
    #[error("A token with identifier '{0}' already exists")]
    DuplicateIdentifier(String),
    #[error("Unknown grant '{0}'")]
    UnknownGrant(String),
    #[error("Token lifetime of {0} seconds is out of range")]
    TtlOutOfRange(u64),
    #[error("Invalid token")]
    Invalid,
    #[error("Token has expired")]
    Expired,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Token with id {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl TokenError {
    /// Errors caused by the caller's input rather than by storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TokenError::EmptyIdentifier
                | TokenError::IdentifierTooLong
                | TokenError::DuplicateIdentifier(_)
                | TokenError::UnknownGrant(_)
                | TokenError::TtlOutOfRange(_)
        )
    }
}

/// Process-wide HMAC key used to sign bearer tokens.
#[derive(Clone)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        rand::rng().fill(&mut bytes);
        Self(bytes.to_vec())
    }

    /// Reads the secret from the server state, creating and storing one on
    /// first use.
    pub fn load_or_create(state: &dyn ServerStore) -> Result<Self> {
        if let Some(encoded) = state.get_state(JWT_SECRET_KEY)? {
            let bytes = STANDARD
                .decode(encoded.trim())
                .context("Stored token secret is not valid base64")?;
            return Ok(Self(bytes));
        }
        let secret = Self::generate();
        state.set_state(JWT_SECRET_KEY, &STANDARD.encode(&secret.0))?;
        info!("Generated a new token signing secret");
        Ok(secret)
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSecret(<{} bytes>)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    identifier: String,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub id: i64,
    pub identifier: String,
    /// The signed bearer string. Shown once, never stored.
    pub token: String,
}

/// Identity and grants of a successfully validated bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub identifier: String,
    pub grants: Vec<Grant>,
}

pub struct TokenService {
    store: Arc<dyn TokenStore>,
    secret: TokenSecret,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, secret: TokenSecret) -> Self {
        Self { store, secret }
    }

    pub fn issue(
        &self,
        identifier: &str,
        grant_names: &[String],
        ttl_seconds: Option<u64>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(identifier, grant_names, ttl_seconds, Utc::now().timestamp())
    }

    pub fn issue_at(
        &self,
        identifier: &str,
        grant_names: &[String],
        ttl_seconds: Option<u64>,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        if identifier.is_empty() {
            return Err(TokenError::EmptyIdentifier);
        }
        if identifier.chars().count() > MAX_IDENTIFIER_LEN {
            return Err(TokenError::IdentifierTooLong);
        }
        let grants = parse_grants(grant_names)?;
        let exp = ttl_seconds
            .map(|ttl| {
                i64::try_from(ttl)
                    .ok()
                    .and_then(|ttl| now.checked_add(ttl))
                    .ok_or(TokenError::TtlOutOfRange(ttl))
            })
            .transpose()?;
        if self.store.get_token_by_identifier(identifier)?.is_some() {
            return Err(TokenError::DuplicateIdentifier(identifier.to_string()));
        }

        let id = self.store.create_token(identifier, &grants, exp, now)?;
        let claims = Claims {
            identifier: identifier.to_string(),
            iat: now,
            exp,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret.0),
        )
        .context("Failed to sign token")?;
        info!("Issued token '{}' with grants {:?}", identifier, grants);

        Ok(IssuedToken {
            id,
            identifier: identifier.to_string(),
            token,
        })
    }

    pub fn validate(&self, bearer: &str) -> Result<ValidatedToken, TokenError> {
        self.validate_at(bearer, Utc::now().timestamp())
    }

    /// Verifies the signature and expiry of `bearer`, then returns the grants
    /// currently stored for its identifier.
    pub fn validate_at(&self, bearer: &str, now: i64) -> Result<ValidatedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<Claims>(
            bearer.trim(),
            &DecodingKey::from_secret(&self.secret.0),
            &validation,
        )
        .map_err(|err| {
            debug!("Rejected bearer token: {}", err);
            TokenError::Invalid
        })?
        .claims;

        if claims.exp.is_some_and(|exp| exp < now) {
            return Err(TokenError::Expired);
        }

        let stored = self
            .store
            .get_token_by_identifier(&claims.identifier)?
            .ok_or(TokenError::Revoked)?;
        self.store.touch_last_used(&stored.identifier, now)?;

        Ok(ValidatedToken {
            identifier: stored.identifier,
            grants: stored.grants,
        })
    }

    pub fn revoke(&self, id: i64) -> Result<(), TokenError> {
        if self.store.delete_token(id)? {
            info!("Revoked token {}", id);
            Ok(())
        } else {
            Err(TokenError::NotFound(id))
        }
    }

    /// Replaces the grants of token `id`. Bearers already handed out see
    /// the new grants on their next request.
    pub fn set_grants(&self, id: i64, grant_names: &[String]) -> Result<Vec<Grant>, TokenError> {
        let grants = parse_grants(grant_names)?;
        if !self.store.update_grants(id, &grants)? {
            return Err(TokenError::NotFound(id));
        }
        info!("Token {} now has grants {:?}", id, grants);
        Ok(grants)
    }

    pub fn list(&self) -> Result<Vec<CapabilityToken>, TokenError> {
        Ok(self.store.list_tokens()?)
    }
}

fn parse_grants(names: &[String]) -> Result<Vec<Grant>, TokenError> {
    let mut grants = Vec::with_capacity(names.len());
    for name in names {
        let grant: Grant = name
            .trim()
            .parse()
            .map_err(TokenError::UnknownGrant)?;
        if !grants.contains(&grant) {
            grants.push(grant);
        }
    }
    Ok(grants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_store::SqliteServerStore;
    use crate::token::SqliteTokenStore;
    use tempfile::TempDir;

    struct TestService {
        service: TokenService,
        store: Arc<SqliteTokenStore>,
        _temp_dir: TempDir,
    }

    fn create_test_service() -> TestService {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteTokenStore::new(temp_dir.path().join("tokens.db")).unwrap());
        let service = TokenService::new(store.clone(), TokenSecret::generate());
        TestService {
            service,
            store,
            _temp_dir: temp_dir,
        }
    }

    fn grants(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_issue_and_validate() {
        let test = create_test_service();
        let issued = test
            .service
            .issue_at("ci", &grants(&["LIVE_API", "SQL", "LIVE_API"]), None, 100)
            .unwrap();
        assert_eq!(issued.identifier, "ci");

        let validated = test.service.validate_at(&issued.token, 200).unwrap();
        assert_eq!(validated.identifier, "ci");
        assert_eq!(validated.grants, vec![Grant::LiveApi, Grant::Sql]);

        let stored = test.store.get_token_by_identifier("ci").unwrap().unwrap();
        assert_eq!(stored.last_used_at, Some(200));
    }

    #[test]
    fn test_issue_rejects_bad_input() {
        let test = create_test_service();
        assert!(matches!(
            test.service.issue("", &grants(&["SQL"]), None),
            Err(TokenError::EmptyIdentifier)
        ));
        assert!(matches!(
            test.service.issue(&"x".repeat(256), &grants(&["SQL"]), None),
            Err(TokenError::IdentifierTooLong)
        ));
        assert!(test.service.issue(&"x".repeat(255), &[], None).is_ok());
        assert!(matches!(
            test.service.issue("ci", &grants(&["SQL", "ROOT"]), None),
            Err(TokenError::UnknownGrant(name)) if name == "ROOT"
        ));
        assert!(test.store.get_token_by_identifier("ci").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_identifier_fails_second_issue() {
        let test = create_test_service();
        test.service.issue("ci", &grants(&["EXEC"]), None).unwrap();
        let err = test.service.issue("ci", &grants(&["EVAL"]), None).unwrap_err();
        assert!(matches!(err, TokenError::DuplicateIdentifier(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_expired_token_fails() {
        let test = create_test_service();
        let issued = test
            .service
            .issue_at("short", &grants(&["SQL"]), Some(60), 1_000)
            .unwrap();
        assert!(test.service.validate_at(&issued.token, 1_060).is_ok());
        assert!(matches!(
            test.service.validate_at(&issued.token, 1_061),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        let test = create_test_service();
        let err = test
            .service
            .issue_at("forever", &grants(&["SQL"]), Some(u64::MAX), 1_000)
            .unwrap_err();
        assert!(matches!(err, TokenError::TtlOutOfRange(u64::MAX)));
        assert!(err.is_validation());
        assert!(matches!(
            test.service
                .issue_at("edge", &grants(&["SQL"]), Some(i64::MAX as u64), 1_000),
            Err(TokenError::TtlOutOfRange(_))
        ));
        assert!(test.store.get_token_by_identifier("forever").unwrap().is_none());

        let issued = test
            .service
            .issue_at("long", &grants(&["SQL"]), Some(i64::MAX as u64 - 1_000), 1_000)
            .unwrap();
        assert!(test.service.validate_at(&issued.token, 2_000_000_000).is_ok());
    }

    #[test]
    fn test_revoked_token_fails_with_valid_signature() {
        let test = create_test_service();
        let issued = test.service.issue("ci", &grants(&["SQL"]), None).unwrap();
        test.service.revoke(issued.id).unwrap();
        assert!(matches!(
            test.service.validate(&issued.token),
            Err(TokenError::Revoked)
        ));
        assert!(matches!(
            test.service.revoke(issued.id),
            Err(TokenError::NotFound(_))
        ));
    }

    #[test]
    fn test_store_grants_are_authoritative() {
        let test = create_test_service();
        let issued = test.service.issue("ci", &grants(&["SQL"]), None).unwrap();
        let updated = test
            .service
            .set_grants(issued.id, &grants(&["ENV_INFO", "ENV_INFO"]))
            .unwrap();
        assert_eq!(updated, vec![Grant::EnvInfo]);
        let validated = test.service.validate(&issued.token).unwrap();
        assert_eq!(validated.grants, vec![Grant::EnvInfo]);

        assert!(matches!(
            test.service.set_grants(issued.id, &grants(&["ROOT"])),
            Err(TokenError::UnknownGrant(_))
        ));
        assert!(matches!(
            test.service.set_grants(issued.id + 1, &[]),
            Err(TokenError::NotFound(_))
        ));
    }

    #[test]
    fn test_foreign_or_corrupt_tokens_are_invalid() {
        let test = create_test_service();
        let other = TokenService::new(test.store.clone(), TokenSecret::generate());
        let foreign = other.issue("ci", &grants(&["SQL"]), None).unwrap();
        assert!(matches!(
            test.service.validate(&foreign.token),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            test.service.validate("not.a.jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_secret_is_created_once() {
        let temp_dir = TempDir::new().unwrap();
        let state = SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap();
        let first = TokenSecret::load_or_create(&state).unwrap();
        let second = TokenSecret::load_or_create(&state).unwrap();
        assert_eq!(first.0.len(), SECRET_LEN);
        assert_eq!(first.0, second.0);
    }
}
