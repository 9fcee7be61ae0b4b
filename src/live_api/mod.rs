//! Live view of the installed codebase: module discovery, token scanning,
//! the resumable indexer and source extraction.

pub mod extractor;
pub mod indexer;
pub mod lexer;
mod models;
pub mod modules;
pub mod scanner;
mod service;
pub mod symbols;

pub use indexer::ModuleIndexer;
pub use models::*;
pub use service::{LiveApiError, LiveApiService, FUNCTIONS_PAGE_SIZE};
