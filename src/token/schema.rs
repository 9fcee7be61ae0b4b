//! SQLite schema for the token database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const TOKENS_TABLE_V1: Table = Table {
    name: "tokens",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("identifier", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("grants", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("expiration", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("modified_at", &SqlType::Integer, non_null = true),
        sqlite_column!("last_used_at", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const TOKEN_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[TOKENS_TABLE_V1],
    migration: None,
}];
