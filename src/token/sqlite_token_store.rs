use super::grants::Grant;
use super::schema::TOKEN_VERSIONED_SCHEMAS;
use super::token_store::{CapabilityToken, TokenStore};
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const TOKEN_COLUMNS: &str = "id, identifier, grants, expiration, created_at, last_used_at";

pub struct SqliteTokenStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTokenStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let (conn, _) = open_versioned(db_path.as_ref(), TOKEN_VERSIONED_SCHEMAS, "token")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<CapabilityToken> {
        let grants_json: String = row.get(2)?;
        // Rows are only written through this store; an unreadable grant
        // list degrades to no grants instead of failing every lookup.
        let grants: Vec<Grant> = serde_json::from_str(&grants_json).unwrap_or_default();
        Ok(CapabilityToken {
            id: row.get(0)?,
            identifier: row.get(1)?,
            grants,
            expiration: row.get(3)?,
            created_at: row.get(4)?,
            last_used_at: row.get(5)?,
        })
    }
}

impl TokenStore for SqliteTokenStore {
    fn create_token(
        &self,
        identifier: &str,
        grants: &[Grant],
        expiration: Option<i64>,
        created_at: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tokens (identifier, grants, expiration, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                identifier,
                serde_json::to_string(grants)?,
                expiration,
                created_at
            ],
        )
        .with_context(|| format!("Failed to insert token '{}'", identifier))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_token_by_identifier(&self, identifier: &str) -> Result<Option<CapabilityToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE identifier = ?1"),
                params![identifier],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    fn list_tokens(&self) -> Result<Vec<CapabilityToken>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {TOKEN_COLUMNS} FROM tokens ORDER BY id"))?;
        let tokens = stmt
            .query_map([], Self::row_to_token)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tokens)
    }

    fn update_grants(&self, id: i64, grants: &[Grant]) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE tokens SET grants = ?2, modified_at = strftime('%s', 'now') WHERE id = ?1",
            params![id, serde_json::to_string(grants)?],
        )?;
        Ok(updated > 0)
    }

    fn touch_last_used(&self, identifier: &str, at: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tokens SET last_used_at = ?2 WHERE identifier = ?1",
            params![identifier, at],
        )?;
        Ok(())
    }

    fn delete_token(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
