use super::markdown::{content_hash, extract_description, extract_title};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub const DOCS_URI_SCHEME: &str = "bx-docs://";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("Unknown resource type: {0}")]
    UnknownScheme(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAnnotations {
    pub audience: Vec<String>,
    pub last_modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ResourceAnnotations {
    pub fn for_assistant(last_modified: String) -> Self {
        Self {
            audience: vec!["assistant".to_string()],
            last_modified,
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListItem {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    pub mime_type: String,
    pub annotations: ResourceAnnotations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDetail {
    pub uri: String,
    pub name: String,
    pub title: String,
    pub text: String,
    pub mime_type: String,
    pub annotations: ResourceAnnotations,
}

/// A directory of Markdown pages exposed as `bx-docs://` resources.
pub struct DocsLibrary {
    base_dir: PathBuf,
}

impl DocsLibrary {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Every non-empty Markdown page, sorted by path, keeping only the first
    /// page of each group with the same normalised content.
    pub fn unique_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        WalkDir::new(&self.base_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
            .filter_map(|entry| {
                let content = fs::read_to_string(entry.path()).ok()?;
                if content.trim().is_empty() {
                    return None;
                }
                if !seen.insert(content_hash(&content)) {
                    debug!("Skipping duplicate page {:?}", entry.path());
                    return None;
                }
                Some(entry.into_path())
            })
            .collect()
    }

    pub fn list_resources(&self) -> Result<Vec<ResourceListItem>> {
        self.unique_files()
            .into_iter()
            .map(|path| {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                Ok(ResourceListItem {
                    uri: self.uri_for(&path),
                    name: file_name(&path),
                    title: Some(extract_title(&content, &path)),
                    description: extract_description(&content),
                    mime_type: MARKDOWN_MIME_TYPE.to_string(),
                    annotations: ResourceAnnotations::for_assistant(last_modified(&path)),
                })
            })
            .collect()
    }

    pub fn read_resource(&self, uri: &str) -> Result<ResourceDetail, DocsError> {
        let path = self.path_for(uri)?;
        let text = fs::read_to_string(&path).map_err(|_| DocsError::NotFound(uri.to_string()))?;
        Ok(ResourceDetail {
            uri: uri.to_string(),
            name: file_name(&path).unwrap_or_default(),
            title: extract_title(&text, &path),
            text,
            mime_type: MARKDOWN_MIME_TYPE.to_string(),
            annotations: ResourceAnnotations::for_assistant(last_modified(&path)),
        })
    }

    pub fn uri_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}", DOCS_URI_SCHEME, joined)
    }

    /// Maps a `bx-docs://` URI back to a file below the base directory.
    pub fn path_for(&self, uri: &str) -> Result<PathBuf, DocsError> {
        let relative = uri
            .strip_prefix(DOCS_URI_SCHEME)
            .ok_or_else(|| DocsError::UnknownScheme(uri.to_string()))?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(DocsError::NotFound(uri.to_string()));
        }
        Ok(self.base_dir.join(relative))
    }

    /// Last modification time of a page named relative to the base directory.
    pub fn last_modified_of(&self, relative: &str) -> String {
        last_modified(&self.base_dir.join(relative))
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// RFC 3339 modification time, empty when unknown.
fn last_modified(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, false))
        .unwrap_or_default()
}
