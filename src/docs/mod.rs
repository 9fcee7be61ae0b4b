//! Documentation pages served as protocol resources, plus semantic search
//! over their precomputed chunk embeddings.

mod library;
pub mod markdown;
mod search;

pub use library::{
    DocsError, DocsLibrary, ResourceAnnotations, ResourceDetail, ResourceListItem,
    DOCS_URI_SCHEME, MARKDOWN_MIME_TYPE,
};
pub use search::{cosine_similarity, DocChunk, DocsSearch, DocsSearchHit, DocsSearchResults, DEFAULT_TOP_K};
