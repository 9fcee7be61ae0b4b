//! MCP Tools
//!
//! Registered in catalog order: host pass-throughs, documentation search,
//! then the LiveAPI tools.

pub mod docs;
pub mod host;
pub mod live_api;

use super::registry::McpRegistry;

/// Register all tools with the registry
pub fn register_all_tools(registry: &mut McpRegistry) {
    host::register_tools(registry);
    docs::register_tools(registry);
    live_api::register_tools(registry);
}
