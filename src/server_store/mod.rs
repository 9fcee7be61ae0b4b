mod schema;
mod sqlite_server_store;

pub use schema::SERVER_VERSIONED_SCHEMAS;
pub use sqlite_server_store::SqliteServerStore;

use anyhow::Result;

/// Key under which the token signing secret is persisted (base64).
pub const JWT_SECRET_KEY: &str = "jwt_secret_key";
/// JSON summary of the last completed module reindex.
pub const INDEXED_MODULES_STAT_KEY: &str = "live_api_indexed_modules_stat";
/// `Y` while the module index is known to be out of date.
pub const NEED_TO_REINDEX_KEY: &str = "need_to_reindex_modules";

pub trait ServerStore: Send + Sync {
    fn get_state(&self, key: &str) -> Result<Option<String>>;
    fn set_state(&self, key: &str, value: &str) -> Result<()>;
}
