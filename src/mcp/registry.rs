//! MCP Tool Registry
//!
//! Static catalog of tools in the order clients see them. The grant a tool
//! needs is derived from its name.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::context::ToolContext;
use super::protocol::{McpError, ToolDefinition, ToolOutput};
use super::schema::ToolSchema;
use crate::token::{is_tool_allowed, Grant};

// ============================================================================
// Tool Types
// ============================================================================

/// Result type for tool execution
pub type ToolResult = Result<ToolOutput, McpError>;

/// Boxed future for async tool execution
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Tool handler function type
pub type ToolHandler = Arc<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>;

/// Health check of a service a tool depends on. Runs on every `tools/list`.
pub type LivenessProbe =
    Arc<dyn Fn(ToolContext) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// A registered tool with metadata and handler
pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub input_schema: ToolSchema,
    pub output_schema: Option<ToolSchema>,
    pub handler: ToolHandler,
    pub liveness: Option<LivenessProbe>,
}

impl RegisteredTool {
    /// The single grant whose name prefixes this tool's name.
    pub fn required_grant(&self) -> Option<Grant> {
        let mut covering = Grant::ALL.into_iter().filter(|g| g.covers(&self.name));
        match (covering.next(), covering.next()) {
            (Some(grant), None) => Some(grant),
            _ => None,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
        }
    }

    async fn is_live(&self, ctx: &ToolContext) -> bool {
        match &self.liveness {
            Some(probe) => probe(ctx.clone()).await,
            None => true,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct McpRegistry {
    tools: Vec<RegisteredTool>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A later tool with the same name replaces the earlier.
    pub fn register_tool(&mut self, tool: RegisteredTool) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name == tool.name) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Tools the caller's grants unlock, minus those whose backing service
    /// is down right now.
    pub async fn available_tools(&self, ctx: &ToolContext) -> Vec<ToolDefinition> {
        let mut available = Vec::new();
        for tool in &self.tools {
            if !is_tool_allowed(&tool.name, &ctx.grants) {
                continue;
            }
            if !tool.is_live(ctx).await {
                debug!("Hiding tool {}: liveness probe failed", tool.name);
                continue;
            }
            available.push(tool.definition());
        }
        available
    }

    pub fn get_tool(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for registering a tool
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: ToolSchema,
    output_schema: Option<ToolSchema>,
    liveness: Option<LivenessProbe>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: ToolSchema::object(),
            output_schema: None,
            liveness: None,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn input_schema(mut self, schema: ToolSchema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn output_schema(mut self, schema: ToolSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn liveness<F, Fut>(mut self, probe: F) -> Self
    where
        F: Fn(ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.liveness = Some(Arc::new(move |ctx| Box::pin(probe(ctx))));
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> RegisteredTool
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        RegisteredTool {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
            liveness: self.liveness,
        }
    }
}
