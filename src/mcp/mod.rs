//! MCP (Model Context Protocol) Gateway
//!
//! Exposes the LiveAPI, documentation and host tools to AI agents.
//!
//! ## Architecture
//!
//! - Transport: JSON-RPC 2.0 over `POST /mcp`
//! - Auth: capability tokens, checked before dispatch
//! - Tools: gated by the grant prefixing their name
//! - Resources: documentation pages under `bx-docs://`

pub mod context;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{McpServices, ToolContext};
pub use handler::{create_mcp_state, handle_request, McpState};
pub use protocol::{McpError, McpRequest, McpResponse, RequestId};
pub use registry::McpRegistry;
