//! MCP Tool Execution Context
//!
//! Gives tool and resource handlers the authenticated caller and the
//! services they act on.

use std::sync::Arc;

use crate::docs::{DocsLibrary, DocsSearch};
use crate::embedding::EmbeddingService;
use crate::host::HostConfig;
use crate::live_api::LiveApiService;
use crate::token::Grant;

/// Services shared by every request.
#[derive(Clone)]
pub struct McpServices {
    pub live_api: Arc<LiveApiService>,
    pub docs: Arc<DocsLibrary>,
    pub docs_search: Arc<DocsSearch>,
    pub embeddings: Arc<dyn EmbeddingService>,
    pub host: HostConfig,
}

/// Context provided to tool and resource handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    /// Identifier of the capability token that authenticated the request
    pub token_identifier: String,

    /// Grants currently stored for that token
    pub grants: Vec<Grant>,

    pub services: McpServices,
}

impl ToolContext {
    pub fn new(token_identifier: String, grants: Vec<Grant>, services: McpServices) -> Self {
        Self {
            token_identifier,
            grants,
            services,
        }
    }
}
