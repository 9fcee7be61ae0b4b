//! Documentation Tools

use serde::Deserialize;
use serde_json::Value;

use crate::docs::DEFAULT_TOP_K;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolOutput};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::mcp::schema::{PropertySchema, ToolSchema};

/// Register documentation tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(search_bx_docs_tool());
}

#[derive(Debug, Deserialize)]
struct SearchBxDocsParams {
    query: String,
}

fn search_bx_docs_tool() -> RegisteredTool {
    ToolBuilder::new("searchBxDocs")
        .description("Searches the Bitrix Framework documentation")
        .input_schema(
            ToolSchema::object()
                .required_property("query", PropertySchema::string().describe("Search query")),
        )
        .output_schema(
            ToolSchema::object().required_property(
                "results",
                PropertySchema::array(PropertySchema::named("resource"))
                    .describe("Documentation fragments relevant to the query"),
            ),
        )
        .liveness(|ctx: ToolContext| async move { ctx.services.embeddings.is_available().await })
        .build(search_bx_docs_handler)
}

async fn search_bx_docs_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SearchBxDocsParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let services = &ctx.services;
    let results = services
        .docs_search
        .search(
            &params.query,
            services.embeddings.as_ref(),
            &services.docs,
            DEFAULT_TOP_K,
        )
        .await
        .map_err(|e| McpError::ToolExecutionFailed(e.to_string()))?;
    ToolOutput::json(&results)
}
