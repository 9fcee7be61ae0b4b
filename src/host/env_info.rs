use super::commands::eval_php;
use super::HostConfig;
use crate::live_api::modules::{discover_modules, module_name};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::warn;

const PHP_INFO_SNIPPET: &str = r#"echo json_encode(['version' => PHP_VERSION, 'extensions' => get_loaded_extensions(), 'memoryLimit' => ini_get('memory_limit'), 'maxExecutionTime' => ini_get('max_execution_time')]);"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvInfo {
    pub system: SystemInfo,
    pub bitrix: BitrixInfo,
    pub php: PhpInfo,
    pub database: DatabaseInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub hostname: String,
    pub user: String,
    pub total_disk_space: Option<u64>,
    pub free_disk_space: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitrixInfo {
    pub edition: String,
    pub version: String,
    pub modules: Vec<BitrixModuleItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitrixModuleItem {
    pub code: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhpInfo {
    pub version: String,
    pub extensions: Vec<String>,
    pub memory_limit: String,
    pub max_execution_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub host: String,
    pub name: String,
}

/// Gathers a snapshot of the host. Facts that cannot be read are left empty.
pub async fn collect_env_info(config: &HostConfig) -> EnvInfo {
    EnvInfo {
        system: system_info(&config.document_root).await,
        bitrix: bitrix_info(&config.document_root),
        php: php_info(config).await,
        database: database_info(config.sql_database.as_deref()),
    }
}

async fn system_info(document_root: &Path) -> SystemInfo {
    let os = command_output("uname", &["-srm"])
        .await
        .unwrap_or_else(|| std::env::consts::OS.to_string());
    let hostname = match command_output("hostname", &[]).await {
        Some(name) => name,
        None => std::env::var("HOSTNAME").unwrap_or_default(),
    };
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    let (total_disk_space, free_disk_space) = disk_space(document_root).await;
    SystemInfo {
        os,
        hostname,
        user,
        total_disk_space,
        free_disk_space,
    }
}

/// Total and available bytes of the filesystem holding `path`, from `df -Pk`.
async fn disk_space(path: &Path) -> (Option<u64>, Option<u64>) {
    let Some(output) = command_output("df", &["-Pk", &path.to_string_lossy()]).await else {
        return (None, None);
    };
    parse_df_output(&output)
}

fn parse_df_output(output: &str) -> (Option<u64>, Option<u64>) {
    let Some(line) = output.lines().nth(1) else {
        return (None, None);
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let kib = |index: usize| {
        fields
            .get(index)
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v * 1024)
    };
    (kib(1), kib(3))
}

fn bitrix_info(document_root: &Path) -> BitrixInfo {
    let modules = discover_modules(document_root);
    let version = modules
        .iter()
        .find(|m| m.id == "main")
        .map(|m| m.version.clone())
        .unwrap_or_default();
    let modules = modules
        .into_iter()
        .filter_map(|module| {
            let name = module_name(&module.path)?;
            if module.version.is_empty() {
                return None;
            }
            Some(BitrixModuleItem {
                code: module.id,
                name,
                version: module.version,
            })
        })
        .collect();
    BitrixInfo {
        edition: edition(document_root),
        version,
        modules,
    }
}

/// Edition name from the license descriptor, when the installation ships one.
fn edition(document_root: &Path) -> String {
    let path = document_root
        .join("bitrix")
        .join("modules")
        .join("main")
        .join("lang")
        .join("en")
        .join("admin")
        .join("define.php");
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| {
            content
                .lines()
                .find(|line| line.contains("EDITION"))
                .and_then(|line| line.split(['"', '\'']).nth(3).map(str::to_string))
        })
        .unwrap_or_default()
}

async fn php_info(config: &HostConfig) -> PhpInfo {
    match eval_php(&config.php_binary, PHP_INFO_SNIPPET, &config.document_root).await {
        Ok(output) => serde_json::from_str(output.trim()).unwrap_or_else(|err| {
            warn!("Unreadable PHP info output: {}", err);
            PhpInfo::default()
        }),
        Err(err) => {
            warn!("PHP info unavailable: {}", err);
            PhpInfo::default()
        }
    }
}

fn database_info(database: Option<&Path>) -> DatabaseInfo {
    let Some(database) = database else {
        return DatabaseInfo::default();
    };
    DatabaseInfo {
        kind: "sqlite".to_string(),
        version: rusqlite::version().to_string(),
        host: "localhost".to_string(),
        name: database
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

async fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_df_output() {
        let output = "Filesystem 1024-blocks Used Available Capacity Mounted on\n/dev/sda1 1000 400 600 40% /\n";
        assert_eq!(parse_df_output(output), (Some(1_024_000), Some(614_400)));
        assert_eq!(parse_df_output(""), (None, None));
    }

    #[test]
    fn test_bitrix_info_lists_named_modules() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "bitrix/modules/main/classes/general/version.php",
            "<?php define(\"SM_VERSION\",\"24.100.0\");",
        );
        write(
            temp.path(),
            "bitrix/modules/iblock/install/version.php",
            "<?php $arModuleVersion = array(\"VERSION\" => \"23.0.1\");",
        );
        write(
            temp.path(),
            "bitrix/modules/iblock/install/index.php",
            "<?php class iblock { function __construct() { $this->MODULE_NAME = \"Information blocks\"; } }",
        );

        let info = bitrix_info(temp.path());
        assert_eq!(info.version, "24.100.0");
        assert_eq!(
            info.modules,
            vec![BitrixModuleItem {
                code: "iblock".into(),
                name: "Information blocks".into(),
                version: "23.0.1".into(),
            }]
        );
    }

    #[test]
    fn test_database_info_names_sqlite_file() {
        let info = database_info(Some(Path::new("/var/db/site.db")));
        assert_eq!(info.kind, "sqlite");
        assert_eq!(info.name, "site.db");
        assert_eq!(database_info(None), DatabaseInfo::default());
        assert_eq!(serde_json::to_value(&info).unwrap()["type"], "sqlite");
    }
}
