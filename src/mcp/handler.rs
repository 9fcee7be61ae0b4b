//! MCP Request Dispatch
//!
//! Maps an authenticated JSON-RPC request onto its method handler. Transport,
//! authentication and envelope finalisation live in `server::rpc`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::context::ToolContext;
use super::protocol::{
    InitializeResult, McpError, McpMethod, McpRequest, PingResult, PromptsListResult,
    ResourcesReadParams, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult,
    ToolsListResult, MCP_PROTOCOL_VERSION,
};
use super::registry::McpRegistry;
use super::resources;
use crate::token::is_tool_allowed;

/// State shared across MCP requests
pub struct McpState {
    pub registry: Arc<McpRegistry>,
    pub server_info: ServerInfo,
}

/// Create the MCP state with every tool registered
pub fn create_mcp_state(server_name: &str, server_version: &str) -> McpState {
    let mut registry = McpRegistry::new();
    super::tools::register_all_tools(&mut registry);

    info!("MCP registry initialized with {} tools", registry.tool_count());

    McpState {
        registry: Arc::new(registry),
        server_info: ServerInfo {
            name: server_name.to_string(),
            version: server_version.to_string(),
        },
    }
}

/// Handle a single, already authenticated MCP request
pub async fn handle_request(
    request: &McpRequest,
    ctx: ToolContext,
    state: &McpState,
) -> Result<Value, McpError> {
    let method = McpMethod::parse(&request.method)
        .ok_or_else(|| McpError::MethodNotFound(request.method.clone()))?;
    debug!("Dispatching {:?} for token {}", method, ctx.token_identifier);

    match method {
        McpMethod::Initialize => to_value(InitializeResult {
            server_info: state.server_info.clone(),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
        }),
        McpMethod::Initialized | McpMethod::Ping => to_value(PingResult {}),
        McpMethod::ToolsList => {
            let tools = state.registry.available_tools(&ctx).await;
            to_value(ToolsListResult { tools })
        }
        McpMethod::ToolsCall => handle_tools_call(request, ctx, state).await,
        McpMethod::PromptsList => to_value(PromptsListResult::default()),
        McpMethod::ResourcesList => to_value(resources::list_resources(&ctx)?),
        McpMethod::ResourcesRead => {
            let params: ResourcesReadParams = parse_params(request)?;
            to_value(resources::read_resource(&ctx, params)?)
        }
    }
}

async fn handle_tools_call(
    request: &McpRequest,
    ctx: ToolContext,
    state: &McpState,
) -> Result<Value, McpError> {
    let params: ToolsCallParams = parse_params(request)?;

    let tool = state
        .registry
        .get_tool(&params.name)
        .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

    if !is_tool_allowed(&tool.name, &ctx.grants) {
        return Err(McpError::PermissionDenied(params.name));
    }

    let arguments = params
        .arguments
        .filter(|args| !args.is_null())
        .unwrap_or_else(|| Value::Object(Default::default()));
    let output = (tool.handler)(ctx, arguments).await?;

    to_value(ToolsCallResult::from_output(&tool.name, output)?)
}

fn parse_params<T: serde::de::DeserializeOwned>(request: &McpRequest) -> Result<T, McpError> {
    serde_json::from_value(request.params_or_empty())
        .map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn to_value<T: Serialize>(result: T) -> Result<Value, McpError> {
    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}
