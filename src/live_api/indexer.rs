//! Resumable, batched indexing of module sources.

use super::lexer::SourceFile;
use super::models::{
    IndexedEvent, IndexedFunction, ModuleFindings, ModuleInfo, ReindexProgress, ReindexStat,
};
use super::modules::{discover_modules, module_source_files, relative_path};
use super::scanner::scan_file;
use crate::index_store::IndexStore;
use crate::server_store::{ServerStore, INDEXED_MODULES_STAT_KEY, NEED_TO_REINDEX_KEY};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entries keyed by name; a later entry replaces an earlier one in place.
struct KeyedEntries<T> {
    entries: Vec<T>,
    positions: HashMap<String, usize>,
}

impl<T> KeyedEntries<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, entry: T) {
        match self.positions.get(name) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions.insert(name.to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

/// Scans every source file of a module. Unreadable files are skipped.
pub fn scan_module(document_root: &Path, module: &ModuleInfo) -> ModuleFindings {
    let mut functions = KeyedEntries::new();
    let mut events = KeyedEntries::new();

    for path in module_source_files(module) {
        let file = match SourceFile::read(&path) {
            Ok(file) => file,
            Err(err) => {
                warn!("Skipping unreadable file {:?}: {}", path, err);
                continue;
            }
        };
        let relative = relative_path(document_root, &path);
        let scan = scan_file(&file);

        for decl in scan.functions {
            let function = IndexedFunction {
                module_id: module.id.clone(),
                module_version: module.version.clone(),
                name: decl.name.clone(),
                file: relative.clone(),
                line: decl.line,
                args: decl.args,
            };
            functions.insert(&decl.name, function);
        }
        for call in scan.events {
            let event = IndexedEvent {
                module_id: module.id.clone(),
                module_version: module.version.clone(),
                name: call.name.clone(),
                file: relative.clone(),
                line: call.line,
                fired_in_func: call.fired_in_func,
            };
            events.insert(&call.name, event);
        }
    }

    ModuleFindings {
        functions: functions.entries,
        events: events.entries,
    }
}

pub struct ModuleIndexer {
    document_root: PathBuf,
    index: Arc<dyn IndexStore>,
    state: Arc<dyn ServerStore>,
}

impl ModuleIndexer {
    pub fn new(
        document_root: PathBuf,
        index: Arc<dyn IndexStore>,
        state: Arc<dyn ServerStore>,
    ) -> Self {
        Self {
            document_root,
            index,
            state,
        }
    }

    /// Indexes modules `[start, start + limit)` of the discovery order.
    ///
    /// `start == 0` wipes the index first. `limit == 0` processes every
    /// remaining module. The batch that reaches the end of the module list
    /// records the reindex summary and clears the reindex-needed flag.
    pub fn reindex(&self, start: usize, limit: usize) -> Result<ReindexProgress> {
        let modules = discover_modules(&self.document_root);
        let total = modules.len();
        let end = if limit == 0 {
            total
        } else {
            start.saturating_add(limit).min(total)
        };
        let batch = modules.get(start..end).unwrap_or_default();

        let findings: Vec<ModuleFindings> = batch
            .iter()
            .map(|module| {
                let found = scan_module(&self.document_root, module);
                debug!(
                    "Module {} ({}): {} functions, {} events",
                    module.id,
                    module.version,
                    found.functions.len(),
                    found.events.len()
                );
                found
            })
            .collect();

        let truncate = start == 0;
        if truncate {
            self.state.set_state(NEED_TO_REINDEX_KEY, "Y")?;
        }
        self.index.write_batch(truncate, &findings)?;

        let processed = batch.len();
        info!(
            "Indexed modules {}..{} of {} ({} functions, {} events)",
            start,
            start + processed,
            total,
            findings.iter().map(|f| f.functions.len()).sum::<usize>(),
            findings.iter().map(|f| f.events.len()).sum::<usize>()
        );

        if end >= total {
            let stat = ReindexStat {
                modules_count: total,
                datetime: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                last_batch_size: processed,
            };
            self.state
                .set_state(INDEXED_MODULES_STAT_KEY, &serde_json::to_string(&stat)?)?;
            self.state.set_state(NEED_TO_REINDEX_KEY, "N")?;
            info!("Module reindex complete: {} modules", total);
        }

        Ok(ReindexProgress { total, processed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::SqliteIndexStore;
    use crate::server_store::SqliteServerStore;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        index: Arc<SqliteIndexStore>,
        state: Arc<SqliteServerStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("db")).unwrap();
            let index = Arc::new(SqliteIndexStore::new(temp.path().join("db/live_api.db")).unwrap());
            let state = Arc::new(SqliteServerStore::new(temp.path().join("db/server.db")).unwrap());
            Self { temp, index, state }
        }

        fn root(&self) -> PathBuf {
            self.temp.path().join("www")
        }

        fn write(&self, relative: &str, content: &str) {
            let path = self.root().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn indexer(&self) -> ModuleIndexer {
            ModuleIndexer::new(self.root(), self.index.clone(), self.state.clone())
        }

        fn snapshot(&self) -> Vec<IndexedFunction> {
            let mut all = Vec::new();
            for module in ["alpha", "beta"] {
                all.extend(self.index.module_functions(module, 0, 100).unwrap());
            }
            all
        }
    }

    fn two_module_fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.write(
            "bitrix/modules/alpha/install/version.php",
            "<?php $arModuleVersion = ['VERSION' => '1.2.3'];",
        );
        fixture.write(
            "bitrix/modules/alpha/lib/a.php",
            "<?php\nnamespace Alpha;\nclass A {\n  public function run($x) { ExecuteModuleEvent('OnAlphaRun'); }\n}\n",
        );
        fixture.write("bitrix/modules/alpha/install/index.php", "<?php function installer() {}");
        fixture.write("bitrix/modules/beta/lib/b.php", "<?php function beta_helper() {}\n");
        fixture
    }

    #[test]
    fn test_single_batch_indexes_everything() {
        let fixture = two_module_fixture();
        let progress = fixture.indexer().reindex(0, 10).unwrap();
        assert_eq!(progress, ReindexProgress { total: 2, processed: 2 });

        let functions = fixture.snapshot();
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha\\A::run", "beta_helper"]);
        assert_eq!(functions[0].file, "/bitrix/modules/alpha/lib/a.php");
        assert_eq!(functions[0].module_version, "1.2.3");

        let events = fixture.index.module_events("alpha").unwrap();
        assert_eq!(events[0].name, "OnAlphaRun");
        assert_eq!(events[0].fired_in_func.as_deref(), Some("Alpha\\A::run"));
    }

    #[test]
    fn test_batches_resume_to_the_same_index() {
        let batched = two_module_fixture();
        let indexer = batched.indexer();
        assert_eq!(indexer.reindex(0, 1).unwrap().processed, 1);
        assert_eq!(
            batched.state.get_state(NEED_TO_REINDEX_KEY).unwrap().as_deref(),
            Some("Y")
        );
        assert_eq!(indexer.reindex(1, 1).unwrap().processed, 1);

        let single = two_module_fixture();
        single.indexer().reindex(0, 2).unwrap();

        assert_eq!(batched.snapshot(), single.snapshot());
        assert_eq!(
            batched.state.get_state(NEED_TO_REINDEX_KEY).unwrap().as_deref(),
            Some("N")
        );
    }

    #[test]
    fn test_final_batch_records_stat() {
        let fixture = two_module_fixture();
        let indexer = fixture.indexer();
        indexer.reindex(0, 1).unwrap();
        assert_eq!(fixture.state.get_state(INDEXED_MODULES_STAT_KEY).unwrap(), None);

        indexer.reindex(1, 1).unwrap();
        let stat: ReindexStat = serde_json::from_str(
            &fixture.state.get_state(INDEXED_MODULES_STAT_KEY).unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(stat.modules_count, 2);
        assert_eq!(stat.last_batch_size, 1);
    }

    #[test]
    fn test_zero_limit_processes_all_remaining() {
        let fixture = two_module_fixture();
        let progress = fixture.indexer().reindex(0, 0).unwrap();
        assert_eq!(progress, ReindexProgress { total: 2, processed: 2 });
        assert_eq!(
            fixture.state.get_state(NEED_TO_REINDEX_KEY).unwrap().as_deref(),
            Some("N")
        );
    }

    #[test]
    fn test_start_beyond_total_is_empty() {
        let fixture = two_module_fixture();
        let progress = fixture.indexer().reindex(5, 1).unwrap();
        assert_eq!(progress, ReindexProgress { total: 2, processed: 0 });
    }

    #[test]
    fn test_restart_truncates_previous_run() {
        let fixture = two_module_fixture();
        let indexer = fixture.indexer();
        indexer.reindex(0, 2).unwrap();
        fs::remove_dir_all(fixture.root().join("bitrix/modules/beta")).unwrap();

        indexer.reindex(0, 1).unwrap();
        assert!(fixture.index.module_functions("beta", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_later_declaration_with_same_name_wins() {
        let fixture = Fixture::new();
        fixture.write("bitrix/modules/dup/lib/a.php", "<?php function same() {}\n");
        fixture.write("bitrix/modules/dup/lib/b.php", "<?php\n\nfunction same($x) {}\n");

        fixture.indexer().reindex(0, 0).unwrap();
        let functions = fixture.index.module_functions("dup", 0, 10).unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].file, "/bitrix/modules/dup/lib/b.php");
        assert_eq!(functions[0].line, 3);
    }
}
