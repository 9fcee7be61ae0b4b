//! Progressive symbol manifest used when a function is not in the index yet.
//!
//! Every lookup loads modules from disk one at a time, in discovery order,
//! so symbols added or moved since the last lookup are seen. Each loaded
//! declaration remembers where it lives so its source can be read back by
//! line range.

use super::extractor::declaration_span;
use super::lexer::SourceFile;
use super::models::{ModuleInfo, SymbolSource};
use super::modules::{discover_modules, module_source_files};
use super::scanner::{scan_declarations, FunctionDecl};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Declaring class, `None` for free functions.
    pub class: Option<String>,
    /// Namespace-qualified function name, or the bare method name.
    pub name: String,
    pub file: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    pub doc_comment: Option<String>,
}

impl Symbol {
    fn display_name(&self) -> String {
        match &self.class {
            Some(class) => format!("{}::{}", class, self.name),
            None => self.name.clone(),
        }
    }

    /// Doc comment followed by the declaration's lines, read from disk now.
    pub fn read_source(&self) -> Option<String> {
        let bytes = fs::read(&self.file).ok()?;
        let content = String::from_utf8_lossy(&bytes);
        let lines: String = content
            .split_inclusive('\n')
            .skip(self.start_line.saturating_sub(1))
            .take((self.end_line + 1).saturating_sub(self.start_line))
            .collect();
        if lines.is_empty() {
            return None;
        }
        Some(match &self.doc_comment {
            Some(doc) => format!("{}\n{}", doc, lines),
            None => lines,
        })
    }
}

/// Symbols of the modules loaded by one lookup. Names are matched without regard
/// to ASCII case; the first declaration of a name wins.
#[derive(Debug, Default)]
struct LoadedSymbols {
    modules: HashSet<String>,
    functions: HashMap<String, Symbol>,
    methods: Vec<Symbol>,
    method_keys: HashMap<(String, String), usize>,
}

impl LoadedSymbols {
    fn add(&mut self, symbol: Symbol) {
        match &symbol.class {
            None => {
                self.functions
                    .entry(symbol.name.to_ascii_lowercase())
                    .or_insert(symbol);
            }
            Some(class) => {
                let key = (class.to_ascii_lowercase(), symbol.name.to_ascii_lowercase());
                if !self.method_keys.contains_key(&key) {
                    self.method_keys.insert(key, self.methods.len());
                    self.methods.push(symbol);
                }
            }
        }
    }

    fn function(&self, name: &str) -> Option<&Symbol> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    fn method(&self, class: &str, method: &str) -> Option<&Symbol> {
        let key = (class.to_ascii_lowercase(), method.to_ascii_lowercase());
        self.method_keys.get(&key).map(|&index| &self.methods[index])
    }

    fn methods_named<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.methods
            .iter()
            .filter(move |symbol| symbol.name.eq_ignore_ascii_case(method))
    }
}

/// A query split into its lookup mode.
#[derive(Clone, Copy)]
enum Lookup<'q> {
    Method { class: &'q str, method: &'q str },
    Bare(&'q str),
}

impl<'q> Lookup<'q> {
    fn parse(query: &'q str) -> Self {
        let query = query.trim().trim_start_matches('\\');
        match query.split_once("::") {
            Some((class, method)) => Lookup::Method {
                class: class.trim_start_matches('\\'),
                method,
            },
            None => Lookup::Bare(query),
        }
    }
}

pub struct SymbolManifest {
    document_root: PathBuf,
}

impl SymbolManifest {
    pub fn new(document_root: PathBuf) -> Self {
        Self { document_root }
    }

    /// Resolves `query` by loading modules until it can be answered.
    ///
    /// A `Class::method` query stops loading as soon as the class declares
    /// that method and yields at most one symbol. A bare name loads every
    /// module, then yields the free function of that name and every method
    /// of that name declared on a loaded class.
    pub fn find(&self, query: &str) -> Vec<Symbol> {
        let lookup = Lookup::parse(query);
        let loaded = self.load_for(lookup);

        match lookup {
            Lookup::Method { class, method } => {
                loaded.method(class, method).cloned().into_iter().collect()
            }
            Lookup::Bare(name) => loaded
                .function(name)
                .into_iter()
                .chain(loaded.methods_named(name))
                .cloned()
                .collect(),
        }
    }

    fn load_for(&self, lookup: Lookup<'_>) -> LoadedSymbols {
        let mut loaded = LoadedSymbols::default();
        for module in discover_modules(&self.document_root) {
            if let Lookup::Method { class, method } = lookup {
                if loaded.method(class, method).is_some() {
                    break;
                }
            }
            load_module(&mut loaded, &module);
        }
        debug!("Symbol lookup loaded {} modules", loaded.modules.len());
        loaded
    }

    /// Source of each resolved symbol. Symbols whose lines can no longer be
    /// read are left out.
    pub fn find_sources(&self, query: &str, return_code: bool) -> Vec<SymbolSource> {
        let query_name = query.trim().trim_start_matches('\\');
        self.find(query)
            .into_iter()
            .filter_map(|symbol| {
                let code = symbol.read_source()?;
                let name = if symbol.class.is_some() && !query_name.contains("::") {
                    symbol.display_name()
                } else {
                    query_name.to_string()
                };
                Some(SymbolSource {
                    name,
                    code: return_code.then_some(code),
                })
            })
            .collect()
    }
}

fn load_module(loaded: &mut LoadedSymbols, module: &ModuleInfo) {
    let mut count = 0;
    for path in module_source_files(module) {
        let file = match SourceFile::read(&path) {
            Ok(file) => file,
            Err(err) => {
                warn!("Skipping unreadable file {:?}: {}", path, err);
                continue;
            }
        };
        for decl in scan_declarations(&file) {
            if let Some(symbol) = symbol_from_declaration(&file, &path, decl) {
                loaded.add(symbol);
                count += 1;
            }
        }
    }
    debug!("Loaded module {} into the symbol manifest ({} symbols)", module.id, count);
    loaded.modules.insert(module.id.clone());
}

fn symbol_from_declaration(file: &SourceFile, path: &Path, decl: FunctionDecl) -> Option<Symbol> {
    let end_line = decl.end_line?;
    let doc_comment = declaration_span(file, decl.token_index)
        .ok()
        .and_then(|span| span.doc_comment)
        .map(|index| String::from_utf8_lossy(file.text(&file.tokens[index])).into_owned());
    let name = match decl.class {
        Some(_) => decl.short_name.clone(),
        None => decl.qualified_function_name(),
    };
    Some(Symbol {
        class: decl.class,
        name,
        file: path.to_path_buf(),
        start_line: decl.line,
        end_line,
        doc_comment,
    })
}
