//! Read and maintenance operations over the module index.

use super::extractor::{extract_declaration, SliceError};
use super::indexer::ModuleIndexer;
use super::lexer::SourceFile;
use super::models::{
    EventItem, FunctionItem, IndexStatus, ModuleEvents, ModuleFunctions, ReindexProgress,
    ReindexStat, SearchResult, SourceLocation, SymbolSource,
};
use super::modules::absolute_path;
use super::symbols::SymbolManifest;
use crate::index_store::{IndexStore, NameMatch};
use crate::pagination::{Cursor, CursorError};
use crate::server_store::{ServerStore, INDEXED_MODULES_STAT_KEY, NEED_TO_REINDEX_KEY};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Functions returned per page by [`LiveApiService::module_functions`].
pub const FUNCTIONS_PAGE_SIZE: usize = 200;

#[derive(Debug, Error)]
pub enum LiveApiError {
    #[error("Module with ID {0} not found")]
    ModuleNotFound(String),
    #[error("Function '{0}' is not indexed")]
    NotIndexed(String),
    #[error("File '{0}' not found")]
    SourceFileNotFound(String),
    #[error("Function '{0}' was not found at its indexed line, the index is stale")]
    StaleIndex(String),
    #[error("Could not find the end of function '{0}'")]
    Unterminated(String),
    #[error("Function or method '{0}' not found")]
    SymbolNotFound(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct LiveApiService {
    document_root: PathBuf,
    index: Arc<dyn IndexStore>,
    state: Arc<dyn ServerStore>,
    indexer: ModuleIndexer,
    manifest: SymbolManifest,
}

impl LiveApiService {
    pub fn new(
        document_root: PathBuf,
        index: Arc<dyn IndexStore>,
        state: Arc<dyn ServerStore>,
    ) -> Self {
        Self {
            indexer: ModuleIndexer::new(document_root.clone(), index.clone(), state.clone()),
            manifest: SymbolManifest::new(document_root.clone()),
            document_root,
            index,
            state,
        }
    }

    pub fn document_root(&self) -> &PathBuf {
        &self.document_root
    }

    pub fn reindex(&self, start: usize, limit: usize) -> Result<ReindexProgress, LiveApiError> {
        Ok(self.indexer.reindex(start, limit)?)
    }

    pub fn status(&self) -> Result<IndexStatus, LiveApiError> {
        let need_to_reindex = self
            .state
            .get_state(NEED_TO_REINDEX_KEY)?
            .is_some_and(|flag| flag == "Y");
        let stat = match self.state.get_state(INDEXED_MODULES_STAT_KEY)? {
            Some(raw) => match serde_json::from_str::<ReindexStat>(&raw) {
                Ok(stat) => Some(stat),
                Err(err) => {
                    warn!("Ignoring malformed reindex stat: {}", err);
                    None
                }
            },
            None => None,
        };
        let (functions, events) = self.index.counts()?;
        Ok(IndexStatus {
            need_to_reindex,
            stat,
            functions,
            events,
        })
    }

    /// One page of a module's functions. Without a cursor the first page of
    /// [`FUNCTIONS_PAGE_SIZE`] entries is returned; `next_cursor` is set only
    /// when more entries follow.
    pub fn module_functions(
        &self,
        module_id: &str,
        cursor: Option<&str>,
    ) -> Result<ModuleFunctions, LiveApiError> {
        let window = match cursor.filter(|c| !c.trim().is_empty()) {
            Some(cursor) => Cursor::decode(cursor)?,
            None => Cursor::new(0, FUNCTIONS_PAGE_SIZE),
        };
        let version = self
            .index
            .module_version(module_id)?
            .ok_or_else(|| LiveApiError::ModuleNotFound(module_id.to_string()))?;

        let mut functions = if window.limit == 0 {
            Vec::new()
        } else {
            self.index
                .module_functions(module_id, window.offset, window.limit.saturating_add(1))?
        };
        let next_cursor = if functions.len() > window.limit {
            functions.truncate(window.limit);
            Some(window.next().encode())
        } else {
            None
        };

        Ok(ModuleFunctions {
            id: module_id.to_string(),
            version,
            functions: functions
                .into_iter()
                .map(|f| FunctionItem::from_indexed(f, false))
                .collect(),
            next_cursor,
        })
    }

    pub fn module_events(&self, module_id: &str) -> Result<ModuleEvents, LiveApiError> {
        let version = self
            .index
            .module_version(module_id)?
            .ok_or_else(|| LiveApiError::ModuleNotFound(module_id.to_string()))?;
        let events = self
            .index
            .module_events(module_id)?
            .into_iter()
            .map(|event| EventItem {
                name: event.name,
                source: SourceLocation {
                    file: event.file,
                    line: event.line,
                    module_id: None,
                },
                fired_in_func: event.fired_in_func.unwrap_or_default(),
            })
            .collect();
        Ok(ModuleEvents {
            id: module_id.to_string(),
            version,
            events,
        })
    }

    /// Looks up indexed functions by exact name, or with SQL `LIKE`
    /// wildcards supplied by the caller when `strict` is off.
    pub fn find_functions(
        &self,
        name: &str,
        module_id: Option<&str>,
        strict: bool,
    ) -> Result<SearchResult<FunctionItem>, LiveApiError> {
        let name_match = if strict {
            NameMatch::Exact
        } else {
            NameMatch::Like
        };
        let items = self
            .index
            .find_functions(name, name_match, module_id)?
            .into_iter()
            .map(|f| FunctionItem::from_indexed(f, true))
            .collect();
        let search_phrase = json!({
            "functionName": name,
            "moduleId": module_id,
            "strictSearch": strict,
        })
        .to_string();
        Ok(SearchResult {
            items,
            search_phrase,
        })
    }

    /// Exact source text of an indexed function, doc comment included.
    pub fn function_source(&self, name: &str, module_id: &str) -> Result<String, LiveApiError> {
        let function = self
            .index
            .get_function(module_id, name)?
            .ok_or_else(|| LiveApiError::NotIndexed(name.to_string()))?;
        let path = absolute_path(&self.document_root, &function.file);
        let file = SourceFile::read(&path).map_err(|err| {
            debug!("Cannot read {:?}: {}", path, err);
            LiveApiError::SourceFileNotFound(function.file.clone())
        })?;
        extract_declaration(&file, function.line).map_err(|err| match err {
            SliceError::DeclarationNotFound => LiveApiError::StaleIndex(name.to_string()),
            SliceError::Unterminated => LiveApiError::Unterminated(name.to_string()),
        })
    }

    /// Resolves a symbol that may not be indexed yet by loading modules into
    /// the symbol manifest.
    pub fn find_by_reflection(
        &self,
        name: &str,
        return_code: bool,
    ) -> Result<SearchResult<SymbolSource>, LiveApiError> {
        let items = self.manifest.find_sources(name, return_code);
        if items.is_empty() {
            return Err(LiveApiError::SymbolNotFound(name.to_string()));
        }
        Ok(SearchResult {
            items,
            search_phrase: name.to_string(),
        })
    }
}
