//! Fixture document root and database directory
//!
//! Builds a minimal Bitrix site on disk with one kernel module and one
//! partner module, plus a small documentation directory.

use super::constants::*;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

const LOADER_PHP: &str = r#"<?php
namespace Bitrix\Main;

class Loader
{
    public static function includeModule($moduleName)
    {
        return true;
    }

    public static function registerAutoLoadClasses($module, array $classes = [])
    {
        $event = new Event('main', 'OnBeforeAutoload', [$classes]);
        $event->send();
        return $classes;
    }
}
"#;

const KLASS_PHP: &str = "<?php\nnamespace NS;\n\nclass Klass\n{\n    /**\n     * Joins two values.\n     */\n    public function method(int $a, string $b = 'x')\n    {\n        return $a . $b;\n    }\n}\n";

/// Creates the fixture site. Returns the temp dir guard, the document root
/// and an empty database directory.
pub fn create_test_site() -> Result<(TempDir, PathBuf, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let document_root = temp_dir.path().join("site");
    let db_dir = temp_dir.path().join("db");
    fs::create_dir_all(&db_dir)?;

    write(
        &document_root,
        "bitrix/modules/main/classes/general/version.php",
        &format!("<?php\ndefine(\"SM_VERSION\",\"{}\");\n", MAIN_MODULE_VERSION),
    )?;
    write(&document_root, "bitrix/modules/main/lib/loader.php", LOADER_PHP)?;

    write(
        &document_root,
        "local/modules/vendor.demo/install/version.php",
        &format!(
            "<?php\n$arModuleVersion = array(\n    \"VERSION\" => \"{}\",\n);\n",
            DEMO_MODULE_VERSION
        ),
    )?;
    write(&document_root, "local/modules/vendor.demo/lib/klass.php", KLASS_PHP)?;

    let docs_dir = db_dir.join("docs");
    write(&docs_dir, "main/loader.md", "# Loader\n\nIncludes modules.\n")?;
    write(&docs_dir, "main/events.md", "# Events\n\nEvent handlers.\n")?;

    Ok((temp_dir, document_root, db_dir))
}
