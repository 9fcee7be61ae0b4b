//! SQLite schema for the module index.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const FUNCTIONS_TABLE_V1: Table = Table {
    name: "live_api_functions",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("module_id", &SqlType::Text, non_null = true),
        sqlite_column!("module_version", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("file", &SqlType::Text, non_null = true),
        sqlite_column!("line", &SqlType::Integer, non_null = true),
        sqlite_column!("args", &SqlType::Text, non_null = true), // JSON array
    ],
    indices: &[
        ("idx_live_api_functions_name", "name"),
        ("idx_live_api_functions_module", "module_id"),
    ],
    unique_constraints: &[&["module_id", "module_version", "name"]],
};

const EVENTS_TABLE_V1: Table = Table {
    name: "live_api_events",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("module_id", &SqlType::Text, non_null = true),
        sqlite_column!("module_version", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("file", &SqlType::Text, non_null = true),
        sqlite_column!("line", &SqlType::Integer, non_null = true),
        sqlite_column!("fired_in_func", &SqlType::Text),
    ],
    indices: &[
        ("idx_live_api_events_name", "name"),
        ("idx_live_api_events_module", "module_id"),
    ],
    unique_constraints: &[&["module_id", "module_version", "name"]],
};

pub const INDEX_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[FUNCTIONS_TABLE_V1, EVENTS_TABLE_V1],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_v1_schema_creates_successfully() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &INDEX_VERSIONED_SCHEMAS[0];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        INDEX_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        let insert = "INSERT INTO live_api_events (module_id, module_version, name, file, line) VALUES ('main', '1.0', 'OnX', '/a.php', 1)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
