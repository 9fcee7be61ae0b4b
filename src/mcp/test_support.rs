//! Fixture site, docs and databases for MCP unit tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use super::context::{McpServices, ToolContext};
use crate::docs::{DocsLibrary, DocsSearch};
use crate::embedding::{EmbeddingService, MockEmbeddingService};
use crate::host::HostConfig;
use crate::index_store::SqliteIndexStore;
use crate::live_api::LiveApiService;
use crate::server_store::SqliteServerStore;
use crate::token::Grant;

pub const TEST_MODULE_ID: &str = "vendor.demo";

pub const CLASS_FIXTURE: &str = "<?php\nnamespace NS;\n\nclass Klass\n{\n    /**\n     * Joins two values.\n     */\n    public function method(int $a, string $b = 'x')\n    {\n        return $a . $b;\n    }\n}\n";

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Context whose embedding service has no expectations set.
pub fn create_test_context(grants: Vec<Grant>) -> (ToolContext, TempDir) {
    create_test_context_with(grants, Arc::new(MockEmbeddingService::new()))
}

pub fn create_test_context_with(
    grants: Vec<Grant>,
    embeddings: Arc<dyn EmbeddingService>,
) -> (ToolContext, TempDir) {
    let temp = TempDir::new().unwrap();
    let site = temp.path().join("site");
    write(
        &site,
        "local/modules/vendor.demo/install/version.php",
        "<?php $arModuleVersion = ['VERSION' => '1.0.0'];",
    );
    write(&site, "local/modules/vendor.demo/lib/klass.php", CLASS_FIXTURE);

    let docs_dir = temp.path().join("docs");
    write(&docs_dir, "main/loader.md", "# Loader\n\nIncludes modules.\n");
    write(&docs_dir, "main/events.md", "# Events\n\nEvent handlers.\n");
    let embeddings_file = temp.path().join("embeddings.json");
    fs::write(
        &embeddings_file,
        serde_json::json!([
            {"file_path": "main/loader.md", "chunk_text": "Includes modules.", "embedding": [1.0, 0.0]},
            {"file_path": "main/events.md", "chunk_text": "Event handlers.", "embedding": [0.0, 1.0]}
        ])
        .to_string(),
    )
    .unwrap();

    let index = Arc::new(SqliteIndexStore::new(temp.path().join("live_api.db")).unwrap());
    let state = Arc::new(SqliteServerStore::new(temp.path().join("server.db")).unwrap());

    let services = McpServices {
        live_api: Arc::new(LiveApiService::new(site.clone(), index, state)),
        docs: Arc::new(DocsLibrary::new(docs_dir)),
        docs_search: Arc::new(DocsSearch::new(embeddings_file)),
        embeddings,
        host: HostConfig {
            document_root: site,
            php_binary: "php".to_string(),
            sql_database: Some(temp.path().join("site.db")),
        },
    };
    let ctx = ToolContext::new("test-token".to_string(), grants, services);
    (ctx, temp)
}
