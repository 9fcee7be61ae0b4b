//! MCP Protocol Types
//!
//! JSON-RPC 2.0 envelopes, the method table and the payloads of the
//! methods the gateway answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::ToolSchema;
use crate::docs::{ResourceDetail, ResourceListItem};

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version we advertise
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

// ============================================================================
// Core Message Types
// ============================================================================

/// Incoming request from an MCP client
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl McpRequest {
    /// Params as an object, `{}` when absent.
    pub fn params_or_empty(&self) -> Value {
        self.params
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

/// Response envelope. `id` is always present, `null` when unknown.
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpErrorResponse>,
    pub id: Option<RequestId>,
}

impl McpResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error.into()),
            id,
        }
    }
}

/// Request ID can be string or number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

/// Error response structure
#[derive(Debug, Clone, Serialize)]
pub struct McpErrorResponse {
    pub code: i32,
    pub message: String,
}

// ============================================================================
// Error Codes
// ============================================================================

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INTERNAL_ERROR: i32 = -32603;

/// MCP error types
#[derive(Debug, Clone)]
pub enum McpError {
    ParseError,
    MethodNotFound(String),
    ToolNotFound(String),
    /// A tool produced something that is neither text nor an object.
    MalformedToolResult { tool: String, kind: String },
    InvalidParams(String),

    Disabled,
    Unauthorized(String),
    PermissionDenied(String),

    ResourceNotFound(String),
    ToolExecutionFailed(String),
    InternalError(String),
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            McpError::ParseError => PARSE_ERROR,
            McpError::MethodNotFound(_)
            | McpError::ToolNotFound(_)
            | McpError::MalformedToolResult { .. } => METHOD_NOT_FOUND,
            _ => INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            McpError::ParseError => "Parse error. Invalid JSON.".to_string(),
            McpError::MethodNotFound(method) => format!("Method not found: '{}'", method),
            McpError::ToolNotFound(tool) => format!("Tool not found: '{}'", tool),
            McpError::MalformedToolResult { tool, kind } => {
                format!("Tool {} returned a result of unsupported type: {}", tool, kind)
            }
            McpError::InvalidParams(msg) => format!("Invalid params: {}", msg),
            McpError::Disabled => "MCP server is disabled".to_string(),
            McpError::Unauthorized(reason) => format!("Unauthorized: {}", reason),
            McpError::PermissionDenied(tool) => {
                format!("Token has no grant for tool '{}'", tool)
            }
            McpError::ResourceNotFound(uri) => format!("Resource not found: {}", uri),
            McpError::ToolExecutionFailed(msg) => msg.clone(),
            McpError::InternalError(msg) => format!("Internal error: {}", msg),
        }
    }
}

impl From<McpError> for McpErrorResponse {
    fn from(err: McpError) -> Self {
        McpErrorResponse {
            code: err.code(),
            message: err.message(),
        }
    }
}

// ============================================================================
// MCP Method Names
// ============================================================================

pub mod methods {
    // Lifecycle
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";

    // Tools
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    // Prompts
    pub const PROMPTS_LIST: &str = "prompts/list";

    // Resources
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
}

/// Every method the gateway answers. Anything else is `MethodNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpMethod {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
    PromptsList,
    ResourcesList,
    ResourcesRead,
}

impl McpMethod {
    pub fn parse(method: &str) -> Option<Self> {
        Some(match method {
            methods::INITIALIZE => McpMethod::Initialize,
            methods::INITIALIZED => McpMethod::Initialized,
            methods::PING => McpMethod::Ping,
            methods::TOOLS_LIST => McpMethod::ToolsList,
            methods::TOOLS_CALL => McpMethod::ToolsCall,
            methods::PROMPTS_LIST => McpMethod::PromptsList,
            methods::RESOURCES_LIST => McpMethod::ResourcesList,
            methods::RESOURCES_READ => McpMethod::ResourcesRead,
            _ => return None,
        })
    }
}

// ============================================================================
// Initialize Messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub server_info: ServerInfo,
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
}

/// Capability flags, each serialized as an empty object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    pub tools: EmptyObject,
    pub prompts: EmptyObject,
    pub resources: EmptyObject,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyObject {}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

// ============================================================================
// Tools Messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<ToolSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// What a tool handler hands back before it is wrapped for the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
}

impl ToolOutput {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, McpError> {
        serde_json::to_value(value)
            .map(ToolOutput::Structured)
            .map_err(|e| McpError::InternalError(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResultContent {
    Text { text: String },
}

impl ToolsCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            structured_content: None,
        }
    }

    /// Wraps a tool's output: text becomes one text block, an object becomes
    /// a JSON text block plus `structuredContent`.
    pub fn from_output(tool: &str, output: ToolOutput) -> Result<Self, McpError> {
        match output {
            ToolOutput::Text(text) => Ok(Self::text(text)),
            ToolOutput::Structured(value @ Value::Object(_)) => {
                let text = serde_json::to_string(&value)
                    .map_err(|e| McpError::InternalError(e.to_string()))?;
                Ok(Self {
                    content: vec![ToolResultContent::Text { text }],
                    structured_content: Some(value),
                })
            }
            ToolOutput::Structured(other) => Err(McpError::MalformedToolResult {
                tool: tool.to_string(),
                kind: json_type_name(&other).to_string(),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Prompts / Resources Messages
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptsListResult {
    pub prompts: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcesListResult {
    pub resources: Vec<ResourceListItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesReadParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcesReadResult {
    pub contents: Vec<ResourceDetail>,
}

// ============================================================================
// Ping
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PingResult {}
