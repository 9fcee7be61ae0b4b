use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub query: String,
}

/// Runs `command` through `sh -c` in `working_dir` and returns its standard
/// output, one line per output line.
pub async fn exec_command(command: &str, working_dir: &Path) -> Result<String> {
    debug!("exec: {}", command);
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .output()
        .await
        .context("Failed to spawn shell")?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().collect::<Vec<_>>().join("\n"))
}

/// Runs `code` with `php -r` and returns whatever it printed.
pub async fn eval_php(php_binary: &str, code: &str, working_dir: &Path) -> Result<String> {
    debug!("eval: {} bytes of code", code.len());
    let output = Command::new(php_binary)
        .arg("-r")
        .arg(code)
        .current_dir(working_dir)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", php_binary))?;
    if !output.status.success() && output.stdout.is_empty() {
        bail!(
            "PHP exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs `query` against the SQLite database at `database` and collects
/// every returned row.
pub async fn run_sql(database: PathBuf, query: String) -> Result<SqlResult> {
    tokio::task::spawn_blocking(move || run_sql_blocking(&database, &query))
        .await
        .context("SQL task panicked")?
}

fn run_sql_blocking(database: &Path, query: &str) -> Result<SqlResult> {
    let conn = Connection::open(database)
        .with_context(|| format!("Failed to open database {:?}", database))?;
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let mut rows = Vec::new();
    let mut result = stmt.query([])?;
    while let Some(row) = result.next()? {
        let mut values = Vec::with_capacity(column_count);
        for index in 0..column_count {
            values.push(match row.get_ref(index)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(i) => Value::from(i),
                ValueRef::Real(f) => Value::from(f),
                ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(b) => Value::from(STANDARD.encode(b)),
            });
        }
        rows.push(values);
    }

    Ok(SqlResult {
        row_count: rows.len(),
        columns,
        rows,
        query: query.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_exec_joins_output_lines() {
        let temp = TempDir::new().unwrap();
        let output = exec_command("printf 'a\\nb\\n'", temp.path()).await.unwrap();
        assert_eq!(output, "a\nb");
    }

    #[tokio::test]
    async fn test_sql_returns_columns_and_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("site.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE options (name TEXT, value INTEGER);
                 INSERT INTO options VALUES ('a', 1), ('b', NULL);",
            )
            .unwrap();
        }

        let result = run_sql(path, "SELECT name, value FROM options ORDER BY name".into())
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name", "value"]);
        assert_eq!(result.rows, vec![vec![json!("a"), json!(1)], vec![json!("b"), Value::Null]]);
        assert_eq!(result.row_count, 2);
        assert_eq!(
            serde_json::to_value(&result).unwrap()["rowCount"],
            json!(2)
        );
    }

    #[tokio::test]
    async fn test_sql_error_is_reported() {
        let temp = TempDir::new().unwrap();
        let result = run_sql(temp.path().join("site.db"), "SELECT * FROM missing".into()).await;
        assert!(result.is_err());
    }
}
