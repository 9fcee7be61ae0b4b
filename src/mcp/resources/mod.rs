//! MCP Resources
//!
//! Documentation pages exposed under the `bx-docs://` scheme.

use super::context::ToolContext;
use super::protocol::{McpError, ResourcesListResult, ResourcesReadParams, ResourcesReadResult};
use crate::docs::DocsError;

impl From<DocsError> for McpError {
    fn from(err: DocsError) -> Self {
        match err {
            DocsError::UnknownScheme(_) => McpError::InvalidParams(err.to_string()),
            DocsError::NotFound(uri) => McpError::ResourceNotFound(uri),
            DocsError::Io(e) => McpError::InternalError(e.to_string()),
        }
    }
}

pub fn list_resources(ctx: &ToolContext) -> Result<ResourcesListResult, McpError> {
    let resources = ctx
        .services
        .docs
        .list_resources()
        .map_err(|e| McpError::InternalError(e.to_string()))?;
    Ok(ResourcesListResult { resources })
}

pub fn read_resource(
    ctx: &ToolContext,
    params: ResourcesReadParams,
) -> Result<ResourcesReadResult, McpError> {
    let detail = ctx.services.docs.read_resource(&params.uri)?;
    Ok(ResourcesReadResult {
        contents: vec![detail],
    })
}
