//! Discovery of installed modules and their source files.

use super::models::ModuleInfo;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Module roots relative to the document root, in discovery order.
pub const MODULE_ROOTS: [&str; 2] = ["bitrix/modules", "local/modules"];

lazy_static! {
    static ref MODULE_VERSION_RE: Regex =
        Regex::new(r#"["']VERSION["']\s*=>\s*["']([^"']+)["']"#)
            .expect("Failed to compile module version pattern");
    static ref KERNEL_VERSION_RE: Regex = Regex::new(r#"SM_VERSION[" ,]+([^"]+)"#)
        .expect("Failed to compile kernel version pattern");
    static ref MODULE_NAME_RE: Regex =
        Regex::new(r#"MODULE_NAME\s*=\s*["']([^"']+)["']"#)
            .expect("Failed to compile module name pattern");
}

/// Lists every module under the module roots.
///
/// Modules are sorted by id within each root, and roots are visited in a
/// fixed order, so batch offsets stay stable between calls.
pub fn discover_modules(document_root: &Path) -> Vec<ModuleInfo> {
    let mut modules = Vec::new();
    for root in MODULE_ROOTS {
        let root_path = document_root.join(root);
        let Ok(entries) = fs::read_dir(&root_path) else {
            debug!("Module root {:?} is not readable, skipping", root_path);
            continue;
        };
        let mut found: Vec<ModuleInfo> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let id = entry.file_name().to_str()?.to_string();
                if id.starts_with('.') {
                    return None;
                }
                let path = entry.path();
                Some(ModuleInfo {
                    version: module_version(&path),
                    id,
                    path,
                })
            })
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        modules.extend(found);
    }
    modules
}

/// Reads the module version from its descriptor, or the kernel version file
/// for the main module. Empty when neither is present.
pub fn module_version(module_path: &Path) -> String {
    let descriptor = module_path.join("install").join("version.php");
    if let Some(version) = capture_first(&descriptor, &MODULE_VERSION_RE) {
        return version;
    }
    let kernel = module_path.join("classes").join("general").join("version.php");
    capture_first(&kernel, &KERNEL_VERSION_RE).unwrap_or_default()
}

/// Human readable module name from the installer class, when it is a literal.
pub fn module_name(module_path: &Path) -> Option<String> {
    capture_first(&module_path.join("install").join("index.php"), &MODULE_NAME_RE)
}

fn capture_first(path: &Path, pattern: &Regex) -> Option<String> {
    let content = fs::read(path).ok()?;
    let content = String::from_utf8_lossy(&content);
    pattern
        .captures(&content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// PHP sources of a module, excluding anything under an `install/` directory.
pub fn module_source_files(module: &ModuleInfo) -> Vec<PathBuf> {
    WalkDir::new(&module.path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir() && entry.file_name() == "install")
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("php"))
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Path of `file` relative to the document root, with a leading `/`.
pub fn relative_path(document_root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(document_root).unwrap_or(file);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", joined.trim_start_matches('/'))
}

/// Inverse of [`relative_path`].
pub fn absolute_path(document_root: &Path, relative: &str) -> PathBuf {
    document_root.join(relative.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn discovers_modules_in_root_order_then_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "bitrix/modules/main/classes/general/version.php", "<?php define(\"SM_VERSION\",\"24.100.0\");");
        write(root, "bitrix/modules/iblock/install/version.php", "<?php $arModuleVersion = array(\"VERSION\" => \"23.5.1\", \"VERSION_DATE\" => \"x\");");
        write(root, "bitrix/modules/.hidden/x.php", "");
        write(root, "local/modules/acme.tools/lib/a.php", "<?php");
        write(root, "bitrix/modules/readme.txt", "");

        let modules = discover_modules(root);
        let ids: Vec<&str> = modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["iblock", "main", "acme.tools"]);
        assert_eq!(modules[0].version, "23.5.1");
        assert_eq!(modules[1].version, "24.100.0");
        assert_eq!(modules[2].version, "");
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_module_directories() {
        let temp = TempDir::new().unwrap();
        let site = temp.path().join("site");
        write(temp.path(), "repo/acme.tools/lib/tools.php", "<?php\nfunction acme_tool() {}\n");
        fs::create_dir_all(site.join("local/modules")).unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("repo/acme.tools"),
            site.join("local/modules/acme.tools"),
        )
        .unwrap();

        let modules = discover_modules(&site);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].id, "acme.tools");
        let files: Vec<String> = module_source_files(&modules[0])
            .iter()
            .map(|p| relative_path(&site, p))
            .collect();
        assert_eq!(files, vec!["/local/modules/acme.tools/lib/tools.php"]);
    }

    #[test]
    fn missing_roots_yield_no_modules() {
        let temp = TempDir::new().unwrap();
        assert!(discover_modules(temp.path()).is_empty());
    }

    #[test]
    fn source_files_skip_install_and_non_php() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "bitrix/modules/m/lib/b.php", "<?php");
        write(root, "bitrix/modules/m/lib/a.PHP", "<?php");
        write(root, "bitrix/modules/m/install/index.php", "<?php");
        write(root, "bitrix/modules/m/lib/install/step.php", "<?php");
        write(root, "bitrix/modules/m/lib/style.css", "");

        let module = discover_modules(root).remove(0);
        let files: Vec<String> = module_source_files(&module)
            .iter()
            .map(|p| relative_path(root, p))
            .collect();
        assert_eq!(
            files,
            vec!["/bitrix/modules/m/lib/a.PHP", "/bitrix/modules/m/lib/b.php"]
        );
    }

    #[test]
    fn relative_and_absolute_paths_are_inverse() {
        let root = Path::new("/var/www");
        let file = Path::new("/var/www/bitrix/modules/main/lib/loader.php");
        let relative = relative_path(root, file);
        assert_eq!(relative, "/bitrix/modules/main/lib/loader.php");
        assert_eq!(absolute_path(root, &relative), file);
    }

    #[test]
    fn reads_literal_module_name() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "m/install/index.php", "<?php class m extends CModule { public $MODULE_NAME = 'Acme tools'; }");
        assert_eq!(module_name(&temp.path().join("m")).as_deref(), Some("Acme tools"));
    }
}
