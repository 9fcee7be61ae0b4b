//! Thin pass-throughs to the host: shell commands, PHP snippets, SQL and
//! environment facts. Nothing here interprets what it forwards.

mod commands;
mod env_info;

pub use commands::{eval_php, exec_command, run_sql, SqlResult};
pub use env_info::{
    collect_env_info, BitrixInfo, BitrixModuleItem, DatabaseInfo, EnvInfo, PhpInfo, SystemInfo,
};

use std::path::PathBuf;

/// Where host pass-throughs find their collaborators.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub document_root: PathBuf,
    pub php_binary: String,
    /// SQLite database the `sql` tool runs against.
    pub sql_database: Option<PathBuf>,
}
