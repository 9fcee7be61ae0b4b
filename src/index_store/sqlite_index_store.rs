use super::schema::INDEX_VERSIONED_SCHEMAS;
use super::{IndexStore, NameMatch};
use crate::live_api::{FunctionArgument, IndexedEvent, IndexedFunction, ModuleFindings};
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const FUNCTION_COLUMNS: &str = "module_id, module_version, name, file, line, args";
const EVENT_COLUMNS: &str = "module_id, module_version, name, file, line, fired_in_func";

pub struct SqliteIndexStore {
    conn: Arc<Mutex<Connection>>,
    created: bool,
}

impl SqliteIndexStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let (conn, created) =
            open_versioned(db_path.as_ref(), INDEX_VERSIONED_SCHEMAS, "index")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            created,
        })
    }

    /// Whether the database file did not exist before this store opened it.
    pub fn was_created(&self) -> bool {
        self.created
    }

    fn row_to_function(row: &rusqlite::Row) -> rusqlite::Result<IndexedFunction> {
        let args_json: String = row.get("args")?;
        let args: Vec<FunctionArgument> = serde_json::from_str(&args_json).unwrap_or_default();
        Ok(IndexedFunction {
            module_id: row.get("module_id")?,
            module_version: row.get("module_version")?,
            name: row.get("name")?,
            file: row.get("file")?,
            line: row.get::<_, i64>("line")? as usize,
            args,
        })
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<IndexedEvent> {
        Ok(IndexedEvent {
            module_id: row.get("module_id")?,
            module_version: row.get("module_version")?,
            name: row.get("name")?,
            file: row.get("file")?,
            line: row.get::<_, i64>("line")? as usize,
            fired_in_func: row.get("fired_in_func")?,
        })
    }

    fn insert_findings(tx: &rusqlite::Transaction, findings: &ModuleFindings) -> Result<()> {
        let mut insert_function = tx.prepare_cached(&format!(
            "INSERT INTO live_api_functions ({FUNCTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(module_id, module_version, name)
             DO UPDATE SET file = excluded.file, line = excluded.line, args = excluded.args"
        ))?;
        for function in &findings.functions {
            let args = serde_json::to_string(&function.args)?;
            insert_function.execute(params![
                function.module_id,
                function.module_version,
                function.name,
                function.file,
                function.line as i64,
                args,
            ])?;
        }

        let mut insert_event = tx.prepare_cached(&format!(
            "INSERT INTO live_api_events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(module_id, module_version, name)
             DO UPDATE SET file = excluded.file, line = excluded.line, fired_in_func = excluded.fired_in_func"
        ))?;
        for event in &findings.events {
            insert_event.execute(params![
                event.module_id,
                event.module_version,
                event.name,
                event.file,
                event.line as i64,
                event.fired_in_func,
            ])?;
        }
        Ok(())
    }
}

impl IndexStore for SqliteIndexStore {
    fn write_batch(&self, truncate: bool, findings: &[ModuleFindings]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        if truncate {
            tx.execute("DELETE FROM live_api_functions", [])?;
            tx.execute("DELETE FROM live_api_events", [])?;
        }
        for module in findings {
            Self::insert_findings(&tx, module)?;
        }
        tx.commit().context("Failed to commit index batch")?;
        Ok(())
    }

    fn module_version(&self, module_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let version = conn
            .query_row(
                "SELECT module_version FROM (
                    SELECT module_version, id FROM live_api_functions WHERE module_id = ?1
                    UNION ALL
                    SELECT module_version, id FROM live_api_events WHERE module_id = ?1
                 ) ORDER BY id LIMIT 1",
                params![module_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    fn module_functions(
        &self,
        module_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IndexedFunction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FUNCTION_COLUMNS} FROM live_api_functions
             WHERE module_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3"
        ))?;
        let functions = stmt
            .query_map(
                params![module_id, limit as i64, offset as i64],
                Self::row_to_function,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(functions)
    }

    fn module_events(&self, module_id: &str) -> Result<Vec<IndexedEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM live_api_events WHERE module_id = ?1 ORDER BY id"
        ))?;
        let events = stmt
            .query_map(params![module_id], Self::row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn find_functions(
        &self,
        name: &str,
        name_match: NameMatch,
        module_id: Option<&str>,
    ) -> Result<Vec<IndexedFunction>> {
        let conn = self.conn.lock().unwrap();
        let operator = match name_match {
            NameMatch::Exact => "=",
            NameMatch::Like => "LIKE",
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {FUNCTION_COLUMNS} FROM live_api_functions
             WHERE name {operator} ?1 AND (?2 IS NULL OR module_id = ?2)
             ORDER BY id"
        ))?;
        let functions = stmt
            .query_map(params![name, module_id], Self::row_to_function)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(functions)
    }

    fn get_function(&self, module_id: &str, name: &str) -> Result<Option<IndexedFunction>> {
        let conn = self.conn.lock().unwrap();
        let function = conn
            .query_row(
                &format!(
                    "SELECT {FUNCTION_COLUMNS} FROM live_api_functions
                     WHERE module_id = ?1 AND name = ?2 ORDER BY id DESC LIMIT 1"
                ),
                params![module_id, name],
                Self::row_to_function,
            )
            .optional()?;
        Ok(function)
    }

    fn counts(&self) -> Result<(usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let functions: i64 =
            conn.query_row("SELECT COUNT(*) FROM live_api_functions", [], |r| r.get(0))?;
        let events: i64 =
            conn.query_row("SELECT COUNT(*) FROM live_api_events", [], |r| r.get(0))?;
        Ok((functions as usize, events as usize))
    }
}
