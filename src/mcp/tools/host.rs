//! Host Tools
//!
//! Environment facts and the shell, PHP and SQL pass-throughs.

use serde::Deserialize;
use serde_json::Value;

use crate::host::{collect_env_info, eval_php, exec_command, run_sql};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolOutput};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::mcp::schema::{PropertySchema, ToolSchema};

/// Register host tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(env_info_tool());
    registry.register_tool(exec_tool());
    registry.register_tool(eval_tool());
    registry.register_tool(sql_tool());
}

// ============================================================================
// envInfo
// ============================================================================

fn env_info_output_schema() -> ToolSchema {
    let string = |d: &str| PropertySchema::string().describe(d);
    ToolSchema::object()
        .required_property(
            "system",
            PropertySchema::object([
                ("os", string("Operating system")),
                ("hostname", string("Host name")),
                ("user", string("User the server runs as")),
                (
                    "totalDiskSpace",
                    PropertySchema::integer().describe("Disk size in bytes"),
                ),
                (
                    "freeDiskSpace",
                    PropertySchema::integer().describe("Free disk space in bytes"),
                ),
            ])
            .describe("System information"),
        )
        .required_property(
            "bitrix",
            PropertySchema::object([
                ("edition", string("Edition")),
                ("version", string("Version of the main module")),
                (
                    "modules",
                    PropertySchema::array(PropertySchema::object([
                        ("code", string("Module code")),
                        ("name", string("Module name")),
                        ("version", string("Module version")),
                    ]))
                    .describe("Installed modules"),
                ),
            ])
            .describe("Bitrix installation"),
        )
        .required_property(
            "php",
            PropertySchema::object([
                ("version", string("PHP version")),
                (
                    "extensions",
                    PropertySchema::array(PropertySchema::string())
                        .describe("Loaded extensions"),
                ),
                ("memoryLimit", string("Memory limit")),
                ("maxExecutionTime", string("Maximum script execution time")),
            ])
            .describe("PHP runtime"),
        )
        .required_property(
            "database",
            PropertySchema::object([
                ("type", string("Database type")),
                ("version", string("Database server version")),
                ("host", string("Connection host")),
                ("name", string("Database name")),
            ])
            .describe("Database connection"),
        )
}

fn env_info_tool() -> RegisteredTool {
    ToolBuilder::new("envInfo")
        .description("Returns information about the server environment")
        .output_schema(env_info_output_schema())
        .build(env_info_handler)
}

async fn env_info_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    let info = collect_env_info(&ctx.services.host).await;
    ToolOutput::json(&info)
}

// ============================================================================
// exec
// ============================================================================

#[derive(Debug, Deserialize)]
struct ExecParams {
    command: String,
}

fn exec_tool() -> RegisteredTool {
    ToolBuilder::new("exec")
        .description("Runs shell commands and returns their console output")
        .input_schema(
            ToolSchema::object()
                .required_property("command", PropertySchema::string().describe("Commands")),
        )
        .build(exec_handler)
}

async fn exec_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ExecParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let output = exec_command(&params.command, &ctx.services.host.document_root)
        .await
        .map_err(|e| McpError::ToolExecutionFailed(e.to_string()))?;
    Ok(ToolOutput::Text(output))
}

// ============================================================================
// eval
// ============================================================================

#[derive(Debug, Deserialize)]
struct EvalParams {
    code: String,
}

fn eval_tool() -> RegisteredTool {
    ToolBuilder::new("eval")
        .description("Runs PHP code on the server and returns what it printed")
        .input_schema(
            ToolSchema::object()
                .required_property("code", PropertySchema::string().describe("PHP code")),
        )
        .build(eval_handler)
}

async fn eval_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: EvalParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let host = &ctx.services.host;
    let output = eval_php(&host.php_binary, &params.code, &host.document_root)
        .await
        .map_err(|e| McpError::ToolExecutionFailed(e.to_string()))?;
    Ok(ToolOutput::Text(output))
}

// ============================================================================
// sql
// ============================================================================

#[derive(Debug, Deserialize)]
struct SqlParams {
    query: String,
}

fn sql_tool() -> RegisteredTool {
    ToolBuilder::new("sql")
        .description("Runs an SQL query on the server and returns the result")
        .input_schema(
            ToolSchema::object()
                .required_property("query", PropertySchema::string().describe("SQL query")),
        )
        .output_schema(
            ToolSchema::object()
                .required_property(
                    "columns",
                    PropertySchema::array(PropertySchema::string()).describe("Column names"),
                )
                .required_property(
                    "rows",
                    PropertySchema::array(PropertySchema::array(PropertySchema::string()))
                        .describe("Rows"),
                )
                .required_property(
                    "rowCount",
                    PropertySchema::integer().describe("Number of returned rows"),
                )
                .required_property(
                    "query",
                    PropertySchema::string().describe("The query as received"),
                ),
        )
        .build(sql_handler)
}

async fn sql_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SqlParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let database = ctx.services.host.sql_database.clone().ok_or_else(|| {
        McpError::ToolExecutionFailed("No SQL database is configured".to_string())
    })?;
    let result = run_sql(database, params.query)
        .await
        .map_err(|e| McpError::ToolExecutionFailed(e.to_string()))?;
    ToolOutput::json(&result)
}
