//! Declaration and event scanning for a single tokenized file.

use super::lexer::{Keyword, SourceFile, Token, TokenCursor, TokenKind};
use super::models::FunctionArgument;
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    static ref EVENT_CALL_RE: Regex = Regex::new(
        r#"(?i-u)(?:new\s+(?:\\Bitrix\\Main\\)?Event|GetModuleEvents)\s*\([^,]+,\s*["']([a-zA-Z0-9_.:-]+)["']|(?:ExecuteModuleEvent|ExecuteEvents)\s*\(\s*["']([a-zA-Z0-9_.:-]+)["']"#
    )
    .expect("Failed to compile event call pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// `Namespace\Class::method` inside a class, the bare name otherwise.
    pub name: String,
    pub short_name: String,
    pub namespace: String,
    pub class: Option<String>,
    pub line: usize,
    /// Line of the closing brace, or of the `;` for bodiless declarations.
    pub end_line: Option<usize>,
    pub token_index: usize,
    pub args: Vec<FunctionArgument>,
}

impl FunctionDecl {
    /// Namespace-qualified name of a free function (`Bitrix\Main\foo`).
    pub fn qualified_function_name(&self) -> String {
        qualify(&self.namespace, &self.short_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCall {
    pub name: String,
    pub line: usize,
    pub fired_in_func: Option<String>,
}

#[derive(Debug, Default)]
pub struct FileScan {
    pub functions: Vec<FunctionDecl>,
    pub events: Vec<EventCall>,
}

pub fn scan_file(file: &SourceFile) -> FileScan {
    let functions = scan_declarations(file);
    let events = scan_events(&file.bytes, &functions);
    FileScan { functions, events }
}

/// Tracks the namespace, class and function scopes of the token being
/// visited, using brace depth to notice when a class or function body ends.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    namespace: String,
    class: Option<(String, usize)>,
    pending_function: Option<usize>,
    open_functions: Vec<(usize, usize)>,
    depth: usize,
}

impl ScopeTracker {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_ref().map(|(name, _)| name.as_str())
    }

    /// Index of the innermost function whose body is open.
    #[cfg(test)]
    pub fn function(&self) -> Option<usize> {
        self.open_functions.last().map(|(index, _)| *index)
    }

    pub fn enter_namespace(&mut self, namespace: String) {
        self.namespace = namespace;
    }

    /// Classes do not nest; a declaration inside an open class is ignored.
    pub fn enter_class(&mut self, short_name: &str) {
        if self.class.is_none() {
            self.class = Some((qualify(&self.namespace, short_name), self.depth));
        }
    }

    pub fn enter_function(&mut self, decl_index: usize) {
        self.pending_function = Some(decl_index);
    }

    pub fn open_brace(&mut self) {
        if let Some(index) = self.pending_function.take() {
            self.open_functions.push((index, self.depth));
        }
        self.depth += 1;
    }

    /// Returns the declaration whose body this brace closes, if any.
    pub fn close_brace(&mut self) -> Option<usize> {
        self.depth = self.depth.saturating_sub(1);
        if matches!(self.class, Some((_, depth)) if depth == self.depth) {
            self.class = None;
        }
        match self.open_functions.last() {
            Some((index, depth)) if *depth == self.depth => {
                let index = *index;
                self.open_functions.pop();
                Some(index)
            }
            _ => None,
        }
    }

    /// Returns the pending bodiless declaration this `;` terminates, if any.
    pub fn statement_end(&mut self) -> Option<usize> {
        self.pending_function.take()
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}\\{}", namespace, name)
    }
}

fn text(file: &SourceFile, token: &Token) -> String {
    String::from_utf8_lossy(file.text(token)).into_owned()
}

fn is_simple_name(file: &SourceFile, token: &Token) -> bool {
    token.kind == TokenKind::Name && !file.text(token).contains(&b'\\')
}

pub fn scan_declarations(file: &SourceFile) -> Vec<FunctionDecl> {
    let mut scopes = ScopeTracker::default();
    let mut decls: Vec<FunctionDecl> = Vec::new();
    let mut cursor = TokenCursor::new(&file.tokens);

    while let Some(token) = cursor.advance() {
        let index = cursor.position() - 1;
        match token.kind {
            TokenKind::Keyword(Keyword::Namespace) => {
                if let Some(namespace) = namespace_name(file, &cursor) {
                    scopes.enter_namespace(namespace);
                }
            }
            TokenKind::Keyword(Keyword::Class | Keyword::Interface | Keyword::Trait) => {
                if let Some(name) = class_name(file, index) {
                    scopes.enter_class(&name);
                }
            }
            TokenKind::Name if file.text(token).eq_ignore_ascii_case(b"enum") => {
                if let Some(name) = enum_name(file, &cursor) {
                    scopes.enter_class(&name);
                }
            }
            TokenKind::Keyword(Keyword::Function) => {
                if let Some(decl) = function_declaration(file, index, &scopes) {
                    scopes.enter_function(decls.len());
                    decls.push(decl);
                }
            }
            TokenKind::Punct(b'{') => scopes.open_brace(),
            TokenKind::Punct(b'}') => {
                if let Some(closed) = scopes.close_brace() {
                    decls[closed].end_line = Some(token.line);
                }
            }
            TokenKind::Punct(b';') => {
                if let Some(closed) = scopes.statement_end() {
                    decls[closed].end_line = Some(token.line);
                }
            }
            _ => {}
        }
    }
    decls
}

/// `namespace Foo\Bar;` yields `Foo\Bar`; `namespace {` yields the global namespace.
fn namespace_name(file: &SourceFile, cursor: &TokenCursor) -> Option<String> {
    let (_, next) = cursor.peek_significant()?;
    match next.kind {
        TokenKind::Name => Some(text(file, next).trim_start_matches('\\').to_string()),
        TokenKind::Punct(b'{') => Some(String::new()),
        _ => None,
    }
}

fn class_name(file: &SourceFile, keyword_index: usize) -> Option<String> {
    let before = TokenCursor::at(&file.tokens, keyword_index);
    if before
        .previous_significant()
        .is_some_and(|t| file.text(t).eq_ignore_ascii_case(b"new"))
    {
        return None;
    }
    let after = TokenCursor::at(&file.tokens, keyword_index + 1);
    let (_, name) = after.peek_significant()?;
    is_simple_name(file, name).then(|| text(file, name))
}

fn enum_name(file: &SourceFile, cursor: &TokenCursor) -> Option<String> {
    let (name_index, name) = cursor.peek_significant()?;
    if !is_simple_name(file, name) {
        return None;
    }
    let (_, follower) = TokenCursor::at(&file.tokens, name_index + 1).peek_significant()?;
    let opens_body = follower.is_punct(b'{')
        || follower.is_punct(b':')
        || file.text(follower).eq_ignore_ascii_case(b"implements");
    opens_body.then(|| text(file, name))
}

fn function_declaration(
    file: &SourceFile,
    keyword_index: usize,
    scopes: &ScopeTracker,
) -> Option<FunctionDecl> {
    let keyword = &file.tokens[keyword_index];
    if TokenCursor::at(&file.tokens, keyword_index)
        .previous_significant()
        .is_some_and(|t| t.is_keyword(Keyword::Use))
    {
        return None;
    }

    let mut cursor = TokenCursor::at(&file.tokens, keyword_index + 1);
    let mut name_token = cursor.advance_significant()?;
    if name_token.is_punct(b'&') {
        name_token = cursor.advance_significant()?;
    }
    if !is_simple_name(file, name_token) {
        return None;
    }

    let short_name = text(file, name_token);
    let args = match cursor.peek_significant() {
        Some((open_index, open)) if open.is_punct(b'(') => parse_arguments(file, open_index),
        _ => Vec::new(),
    };
    let class = scopes.class().map(str::to_string);
    let name = match &class {
        Some(class) => format!("{}::{}", class, short_name),
        None => short_name.clone(),
    };

    Some(FunctionDecl {
        name,
        short_name,
        namespace: scopes.namespace().to_string(),
        class,
        line: keyword.line,
        end_line: None,
        token_index: keyword_index,
        args,
    })
}

#[derive(Default)]
struct ArgumentBuilder {
    type_hint: Vec<u8>,
    name: Option<String>,
    default_value: Vec<u8>,
    in_default: bool,
}

impl ArgumentBuilder {
    fn finish(self) -> Option<FunctionArgument> {
        let type_hint = String::from_utf8_lossy(&self.type_hint).trim().to_string();
        let default_value = String::from_utf8_lossy(&self.default_value).trim().to_string();
        let name = self.name.unwrap_or_default();
        if type_hint.is_empty() && name.is_empty() && default_value.is_empty() {
            return None;
        }
        Some(FunctionArgument {
            type_hint,
            name,
            default_value,
        })
    }
}

/// Splits the parameter list opened at `open_index` into arguments.
///
/// Commas only separate arguments at the outermost level; parentheses,
/// brackets and braces inside defaults or attributes nest.
pub fn parse_arguments(file: &SourceFile, open_index: usize) -> Vec<FunctionArgument> {
    let mut args = Vec::new();
    let mut current = ArgumentBuilder::default();
    let mut nesting = 1usize;
    let mut cursor = TokenCursor::at(&file.tokens, open_index + 1);

    while let Some(token) = cursor.advance() {
        let bytes = file.text(token);
        if token.opens_group(&file.bytes) {
            nesting += 1;
        } else if token.closes_group() {
            nesting -= 1;
            if nesting == 0 {
                break;
            }
        } else if nesting == 1 {
            if token.is_punct(b',') {
                args.extend(std::mem::take(&mut current).finish());
                continue;
            }
            if token.is_punct(b'=') && !current.in_default {
                current.in_default = true;
                continue;
            }
            if token.kind == TokenKind::Variable && current.name.is_none() && !current.in_default {
                current.name = Some(String::from_utf8_lossy(bytes).into_owned());
                continue;
            }
        }

        if current.in_default {
            current.default_value.extend_from_slice(bytes);
        } else if current.name.is_none() {
            current.type_hint.extend_from_slice(bytes);
        }
    }
    args.extend(current.finish());
    args
}

/// Finds event dispatch call sites in the raw file text.
pub fn scan_events(source: &[u8], functions: &[FunctionDecl]) -> Vec<EventCall> {
    EVENT_CALL_RE
        .captures_iter(source)
        .filter_map(|captures| {
            let name = captures.get(2).or_else(|| captures.get(1))?;
            let line = 1 + source[..name.start()].iter().filter(|b| **b == b'\n').count();
            Some(EventCall {
                name: String::from_utf8_lossy(name.as_bytes()).into_owned(),
                line,
                fired_in_func: enclosing_function(functions, line).map(|f| f.name.clone()),
            })
        })
        .collect()
}

/// The function declared closest above `line`.
///
/// Only declaration lines are compared, so a call site after the end of a
/// function body is still attributed to it.
pub fn enclosing_function(functions: &[FunctionDecl], line: usize) -> Option<&FunctionDecl> {
    functions
        .iter()
        .filter(|f| f.line <= line)
        .max_by_key(|f| f.line)
}
