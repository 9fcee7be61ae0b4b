use serde::{Deserialize, Serialize};

/// Installed module discovered under one of the module roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub id: String,
    pub path: std::path::PathBuf,
    /// Empty when the module ships no version descriptor.
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArgument {
    #[serde(rename = "type")]
    pub type_hint: String,
    pub name: String,
    #[serde(rename = "defaultValue")]
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFunction {
    pub module_id: String,
    pub module_version: String,
    pub name: String,
    pub file: String,
    pub line: usize,
    pub args: Vec<FunctionArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEvent {
    pub module_id: String,
    pub module_version: String,
    pub name: String,
    pub file: String,
    pub line: usize,
    pub fired_in_func: Option<String>,
}

/// Everything found in one module during a reindex pass.
#[derive(Debug, Clone, Default)]
pub struct ModuleFindings {
    pub functions: Vec<IndexedFunction>,
    pub events: Vec<IndexedEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexProgress {
    pub total: usize,
    pub processed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexStat {
    pub modules_count: usize,
    pub datetime: String,
    pub last_batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub need_to_reindex: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<ReindexStat>,
    pub functions: usize,
    pub events: usize,
}

// Tool payloads

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionItem {
    pub name: String,
    pub source: SourceLocation,
    pub args: Vec<FunctionArgument>,
}

impl FunctionItem {
    pub fn from_indexed(function: IndexedFunction, with_module: bool) -> Self {
        Self {
            name: function.name,
            source: SourceLocation {
                file: function.file,
                line: function.line,
                module_id: with_module.then_some(function.module_id),
            },
            args: function.args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub name: String,
    pub source: SourceLocation,
    pub fired_in_func: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleFunctions {
    pub id: String,
    pub version: String,
    pub functions: Vec<FunctionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleEvents {
    pub id: String,
    pub version: String,
    pub events: Vec<EventItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub search_phrase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolSource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
