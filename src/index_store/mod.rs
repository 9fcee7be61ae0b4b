mod schema;
mod sqlite_index_store;

pub use schema::INDEX_VERSIONED_SCHEMAS;
pub use sqlite_index_store::SqliteIndexStore;

use crate::live_api::{IndexedEvent, IndexedFunction, ModuleFindings};
use anyhow::Result;

/// How a function name is matched by [`IndexStore::find_functions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    /// SQL `LIKE`, with `%`/`_` wildcards supplied by the caller.
    Like,
}

/// Persisted functions and events discovered by the module scanner.
pub trait IndexStore: Send + Sync {
    /// Stores the findings of one reindex batch in a single transaction,
    /// optionally wiping the whole index first.
    fn write_batch(&self, truncate: bool, findings: &[ModuleFindings]) -> Result<()>;

    /// Version recorded for a module, `None` when nothing of it is indexed.
    fn module_version(&self, module_id: &str) -> Result<Option<String>>;

    /// Functions of a module in insertion order.
    fn module_functions(
        &self,
        module_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IndexedFunction>>;

    fn module_events(&self, module_id: &str) -> Result<Vec<IndexedEvent>>;

    fn find_functions(
        &self,
        name: &str,
        name_match: NameMatch,
        module_id: Option<&str>,
    ) -> Result<Vec<IndexedFunction>>;

    fn get_function(&self, module_id: &str, name: &str) -> Result<Option<IndexedFunction>>;

    /// Number of indexed (functions, events).
    fn counts(&self) -> Result<(usize, usize)>;
}
