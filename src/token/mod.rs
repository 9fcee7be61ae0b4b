//! Capability tokens: signed bearer strings whose grants live in the token
//! store and gate every protocol method.

mod grants;
mod schema;
mod service;
mod sqlite_token_store;
mod token_store;

pub use grants::{is_tool_allowed, upper_snake_case, Grant};
pub use schema::TOKEN_VERSIONED_SCHEMAS;
pub use service::{
    IssuedToken, TokenError, TokenSecret, TokenService, ValidatedToken, MAX_IDENTIFIER_LEN,
};
pub use sqlite_token_store::SqliteTokenStore;
pub use token_store::{CapabilityToken, TokenStore};
