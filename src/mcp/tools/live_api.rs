//! LiveAPI Tools
//!
//! Browsing the indexed codebase: module functions and events, function
//! lookup, exact source and the manifest based fallback finder.

use serde::Deserialize;
use serde_json::Value;

use crate::live_api::LiveApiError;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolOutput};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::mcp::schema::{PropertySchema, ToolSchema};

/// Register LiveAPI tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_module_functions_tool());
    registry.register_tool(get_module_events_tool());
    registry.register_tool(find_function_tool());
    registry.register_tool(get_module_function_code_tool());
    registry.register_tool(find_function_by_reflection_tool());
}

impl From<LiveApiError> for McpError {
    fn from(err: LiveApiError) -> Self {
        match err {
            LiveApiError::InvalidCursor(_) => McpError::InvalidParams(err.to_string()),
            LiveApiError::Storage(e) => McpError::InternalError(e.to_string()),
            other => McpError::ToolExecutionFailed(other.to_string()),
        }
    }
}

/// Runs file reading and parsing work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, McpError>
where
    F: FnOnce() -> Result<T, LiveApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| McpError::InternalError(format!("LiveAPI task failed: {}", e)))?
        .map_err(McpError::from)
}

fn module_id_property() -> PropertySchema {
    PropertySchema::string().describe("Module identifier (code)")
}

fn source_property() -> PropertySchema {
    PropertySchema::object([
        (
            "file",
            PropertySchema::string().describe("File the declaration is in"),
        ),
        (
            "line",
            PropertySchema::integer().describe("Line of the declaration"),
        ),
    ])
    .describe("Where the declaration is")
}

// ============================================================================
// liveApiGetModuleFunctions
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetModuleFunctionsParams {
    module_id: String,
    #[serde(default)]
    cursor: Option<String>,
}

fn get_module_functions_tool() -> RegisteredTool {
    let argument = PropertySchema::object([
        ("type", PropertySchema::string().describe("Argument type")),
        ("name", PropertySchema::string().describe("Argument name")),
        (
            "defaultValue",
            PropertySchema::string().describe("Default value"),
        ),
    ]);
    let function = PropertySchema::object([
        ("name", PropertySchema::string().describe("Function name")),
        ("source", source_property()),
        (
            "args",
            PropertySchema::array(argument).describe("Function arguments"),
        ),
    ])
    .describe("Function information");

    ToolBuilder::new("liveApiGetModuleFunctions")
        .description("Returns the functions declared by an installed module")
        .input_schema(
            ToolSchema::object()
                .required_property("moduleId", module_id_property())
                .property(
                    "cursor",
                    PropertySchema::string()
                        .describe("Pagination cursor. Pass only values received as nextCursor."),
                ),
        )
        .output_schema(
            ToolSchema::object()
                .required_property("id", module_id_property())
                .required_property("version", PropertySchema::string().describe("Module version"))
                .required_property(
                    "functions",
                    PropertySchema::array(function).describe("Functions of the module"),
                )
                .property(
                    "nextCursor",
                    PropertySchema::string().describe("Cursor of the next page"),
                ),
        )
        .build(get_module_functions_handler)
}

async fn get_module_functions_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetModuleFunctionsParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let functions = ctx
        .services
        .live_api
        .module_functions(&params.module_id, params.cursor.as_deref())?;
    ToolOutput::json(&functions)
}

// ============================================================================
// liveApiGetModuleEvents
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleIdParams {
    module_id: String,
}

fn get_module_events_tool() -> RegisteredTool {
    let event = PropertySchema::object([
        ("name", PropertySchema::string().describe("Event name")),
        ("source", source_property()),
        (
            "firedInFunc",
            PropertySchema::string().describe("Function the event is fired from"),
        ),
    ]);

    ToolBuilder::new("liveApiGetModuleEvents")
        .description("Returns the events fired by an installed module")
        .input_schema(ToolSchema::object().required_property("moduleId", module_id_property()))
        .output_schema(
            ToolSchema::object()
                .required_property("id", module_id_property())
                .required_property("version", PropertySchema::string().describe("Module version"))
                .required_property(
                    "events",
                    PropertySchema::array(event).describe("Events of the module"),
                ),
        )
        .build(get_module_events_handler)
}

async fn get_module_events_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ModuleIdParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let events = ctx.services.live_api.module_events(&params.module_id)?;
    ToolOutput::json(&events)
}

// ============================================================================
// liveApiFindFunction
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindFunctionParams {
    function_name: String,
    #[serde(default)]
    module_id: Option<String>,
    #[serde(default)]
    strict_search: bool,
}

fn find_function_tool() -> RegisteredTool {
    ToolBuilder::new("liveApiFindFunction")
        .description(
            "Finds PHP functions among the indexed module functions. Without strict search \
             the name is an SQL LIKE pattern, so % wildcards are allowed.",
        )
        .input_schema(
            ToolSchema::object()
                .required_property(
                    "functionName",
                    PropertySchema::string().describe("PHP function name"),
                )
                .property(
                    "moduleId",
                    PropertySchema::string().describe("Module to search in"),
                )
                .property(
                    "strictSearch",
                    PropertySchema::boolean().describe("Match the name exactly"),
                ),
        )
        .build(find_function_handler)
}

async fn find_function_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: FindFunctionParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let module_id = params.module_id.as_deref().filter(|m| !m.is_empty());
    let found = ctx.services.live_api.find_functions(
        &params.function_name,
        module_id,
        params.strict_search,
    )?;
    ToolOutput::json(&found)
}

// ============================================================================
// liveApiGetModuleFunctionCode
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionCodeParams {
    function_name: String,
    module_id: String,
}

fn get_module_function_code_tool() -> RegisteredTool {
    ToolBuilder::new("liveApiGetModuleFunctionCode")
        .description(
            "Returns the code of a PHP function with its PHPDoc, if any. Only indexed \
             module functions can be looked up.",
        )
        .input_schema(
            ToolSchema::object()
                .required_property(
                    "functionName",
                    PropertySchema::string().describe(
                        "PHP function name as returned by liveApiGetModuleFunctions or \
                         liveApiFindFunction",
                    ),
                )
                .required_property(
                    "moduleId",
                    PropertySchema::string().describe("Module declaring the function"),
                ),
        )
        .build(get_module_function_code_handler)
}

async fn get_module_function_code_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: FunctionCodeParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let live_api = ctx.services.live_api.clone();
    let code = run_blocking(move || {
        live_api.function_source(&params.function_name, &params.module_id)
    })
    .await?;
    Ok(ToolOutput::Text(code))
}

// ============================================================================
// liveApiFindFunctionByReflection
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindByReflectionParams {
    function_name: String,
    #[serde(default = "default_return_code")]
    return_code: bool,
}

fn default_return_code() -> bool {
    true
}

fn find_function_by_reflection_tool() -> RegisteredTool {
    ToolBuilder::new("liveApiFindFunctionByReflection")
        .description(
            "Finds a PHP function or method anywhere in the installed modules, indexed or not",
        )
        .input_schema(
            ToolSchema::object()
                .required_property(
                    "functionName",
                    PropertySchema::string()
                        .describe("Function or method to find, e.g. myFunction or MyClass::myMethod"),
                )
                .property(
                    "returnCode",
                    PropertySchema::boolean().describe(
                        "Include the code of each match. Turn off to only check that a \
                         function exists. Defaults to true.",
                    ),
                ),
        )
        .output_schema(
            ToolSchema::object()
                .required_property(
                    "items",
                    PropertySchema::array(PropertySchema::object([
                        ("name", PropertySchema::string().describe("Full function name")),
                        (
                            "code",
                            PropertySchema::string().describe("Function code with PHPDoc"),
                        ),
                    ]))
                    .describe("Functions found"),
                )
                .required_property(
                    "searchPhrase",
                    PropertySchema::string().describe("The name as searched"),
                ),
        )
        .build(find_function_by_reflection_handler)
}

async fn find_function_by_reflection_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: FindByReflectionParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let live_api = ctx.services.live_api.clone();
    let found = run_blocking(move || {
        live_api.find_by_reflection(&params.function_name, params.return_code)
    })
    .await?;
    ToolOutput::json(&found)
}
