//! Byte-level PHP tokenizer.
//!
//! Every byte of the input belongs to exactly one token, so concatenating the
//! spans of a contiguous token range reproduces the original bytes verbatim.
//! The lexer only distinguishes what the scanner and the extractor need:
//! declaration keywords, names, variables, comments, strings and single
//! character delimiters.

use std::io;
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Namespace,
    Use,
    Class,
    Interface,
    Trait,
    Function,
    Public,
    Protected,
    Private,
    Static,
    Abstract,
    Final,
}

impl Keyword {
    fn lookup(ident: &[u8]) -> Option<Keyword> {
        let keyword = match ident.to_ascii_lowercase().as_slice() {
            b"namespace" => Keyword::Namespace,
            b"use" => Keyword::Use,
            b"class" => Keyword::Class,
            b"interface" => Keyword::Interface,
            b"trait" => Keyword::Trait,
            b"function" => Keyword::Function,
            b"public" => Keyword::Public,
            b"protected" => Keyword::Protected,
            b"private" => Keyword::Private,
            b"static" => Keyword::Static,
            b"abstract" => Keyword::Abstract,
            b"final" => Keyword::Final,
            _ => return None,
        };
        Some(keyword)
    }

    /// Visibility and modifier keywords that may precede a method declaration.
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Keyword::Public
                | Keyword::Protected
                | Keyword::Private
                | Keyword::Static
                | Keyword::Abstract
                | Keyword::Final
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    InlineHtml,
    OpenTag,
    CloseTag,
    Whitespace,
    Comment,
    DocComment,
    Variable,
    /// Identifier, possibly namespace-qualified (`Foo\Bar`, `\strlen`).
    Name,
    Number,
    StringLiteral,
    Heredoc,
    Operator,
    Keyword(Keyword),
    /// Any single byte not covered by another kind: `{`, `}`, `(`, `;`, `=` ...
    Punct(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, byte: u8) -> bool {
        self.kind == TokenKind::Punct(byte)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::DocComment
        )
    }

    pub fn opens_group(&self, source: &[u8]) -> bool {
        match self.kind {
            TokenKind::Punct(b'(') | TokenKind::Punct(b'[') | TokenKind::Punct(b'{') => true,
            TokenKind::Operator => &source[self.span.clone()] == b"#[",
            _ => false,
        }
    }

    pub fn closes_group(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Punct(b')') | TokenKind::Punct(b']') | TokenKind::Punct(b'}')
        )
    }
}

/// A tokenized source file.
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub tokens: Vec<Token>,
}

impl SourceFile {
    pub fn parse(bytes: Vec<u8>) -> Self {
        let tokens = tokenize(&bytes);
        Self { bytes, tokens }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(std::fs::read(path)?))
    }

    pub fn text(&self, token: &Token) -> &[u8] {
        &self.bytes[token.span.clone()]
    }

    /// Bytes covered by tokens `first..=last`.
    pub fn slice(&self, first: usize, last: usize) -> &[u8] {
        &self.bytes[self.tokens[first].span.start..self.tokens[last].span.end]
    }
}

const OPERATORS: &[&[u8]] = &[
    b"<<=", b">>=", b"**=", b"...", b"<=>", b"===", b"!==", b"??=", b"?->", b"::", b"->", b"=>",
    b"==", b"!=", b"<>", b"<=", b">=", b"&&", b"||", b"??", b"++", b"--", b"+=", b"-=", b"*=",
    b"/=", b".=", b"%=", b"&=", b"|=", b"^=", b"<<", b">>", b"**", b"#[",
];

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte >= 0x80
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

pub fn tokenize(source: &[u8]) -> Vec<Token> {
    let mut lexer = Lexer {
        src: source,
        pos: 0,
        line: 1,
        tokens: Vec::new(),
        in_php: false,
    };
    while lexer.pos < source.len() {
        if lexer.in_php {
            lexer.lex_php();
        } else {
            lexer.lex_inline_html();
        }
    }
    lexer.tokens
}

struct Lexer<'s> {
    src: &'s [u8],
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    in_php: bool,
}

impl<'s> Lexer<'s> {
    fn at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'s [u8] {
        &self.src[self.pos..]
    }

    fn emit(&mut self, kind: TokenKind, end: usize) {
        let end = end.min(self.src.len()).max(self.pos + 1);
        let span = self.pos..end;
        let newlines = self.src[span.clone()].iter().filter(|b| **b == b'\n').count();
        self.tokens.push(Token {
            kind,
            span,
            line: self.line,
        });
        self.line += newlines;
        self.pos = end;
    }

    fn open_tag_len(&self, at: usize) -> Option<usize> {
        let rest = &self.src[at..];
        if !rest.starts_with(b"<?") {
            return None;
        }
        if rest.len() >= 5 && rest[2..5].eq_ignore_ascii_case(b"php") {
            return match rest.get(5) {
                None => Some(5),
                Some(b'\r') if rest.get(6) == Some(&b'\n') => Some(7),
                Some(b) if is_whitespace(*b) => Some(6),
                _ => None,
            };
        }
        match rest.get(2) {
            Some(b'=') => Some(3),
            Some(b'\r') if rest.get(3) == Some(&b'\n') => Some(4),
            Some(b) if is_whitespace(*b) => Some(3),
            None => Some(2),
            _ => None,
        }
    }

    fn lex_inline_html(&mut self) {
        let mut cursor = self.pos;
        while cursor < self.src.len() {
            if self.src[cursor] == b'<' {
                if let Some(len) = self.open_tag_len(cursor) {
                    if cursor > self.pos {
                        self.emit(TokenKind::InlineHtml, cursor);
                    }
                    self.emit(TokenKind::OpenTag, cursor + len);
                    self.in_php = true;
                    return;
                }
            }
            cursor += 1;
        }
        self.emit(TokenKind::InlineHtml, self.src.len());
    }

    fn lex_php(&mut self) {
        let rest = self.rest();
        let byte = rest[0];

        if is_whitespace(byte) {
            let len = rest.iter().take_while(|b| is_whitespace(**b)).count();
            self.emit(TokenKind::Whitespace, self.pos + len);
        } else if rest.starts_with(b"?>") {
            let mut end = self.pos + 2;
            if self.src.get(end) == Some(&b'\n') {
                end += 1;
            } else if self.src[end..].starts_with(b"\r\n") {
                end += 2;
            }
            self.emit(TokenKind::CloseTag, end);
            self.in_php = false;
        } else if rest.starts_with(b"//") || (byte == b'#' && rest.get(1) != Some(&b'[')) {
            self.emit(TokenKind::Comment, self.pos + line_comment_len(rest));
        } else if rest.starts_with(b"/*") {
            let is_doc = rest.starts_with(b"/**") && rest.get(3).is_some_and(|b| is_whitespace(*b));
            let end = find(rest, 2, b"*/").map_or(self.src.len(), |at| self.pos + at + 2);
            let kind = if is_doc {
                TokenKind::DocComment
            } else {
                TokenKind::Comment
            };
            self.emit(kind, end);
        } else if byte == b'$' && self.at(1).is_some_and(is_ident_start) {
            let len = 1 + rest[1..].iter().take_while(|b| is_ident_byte(**b)).count();
            self.emit(TokenKind::Variable, self.pos + len);
        } else if is_ident_start(byte) || (byte == b'\\' && self.at(1).is_some_and(is_ident_start)) {
            self.lex_name();
        } else if byte.is_ascii_digit() || (byte == b'.' && self.at(1).is_some_and(|b| b.is_ascii_digit())) {
            self.emit(TokenKind::Number, self.pos + number_len(rest));
        } else if matches!(byte, b'\'' | b'"' | b'`') {
            self.emit(TokenKind::StringLiteral, self.pos + quoted_len(rest, byte));
        } else if let Some(len) = heredoc_len(rest) {
            self.emit(TokenKind::Heredoc, self.pos + len);
        } else if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(op)) {
            self.emit(TokenKind::Operator, self.pos + op.len());
        } else {
            self.emit(TokenKind::Punct(byte), self.pos + 1);
        }
    }

    fn lex_name(&mut self) {
        let rest = self.rest();
        let mut len = 0;
        loop {
            if rest.get(len) == Some(&b'\\') {
                len += 1;
            }
            len += rest[len..].iter().take_while(|b| is_ident_byte(**b)).count();
            let continues = rest.get(len) == Some(&b'\\')
                && rest.get(len + 1).is_some_and(|b| is_ident_start(*b));
            if !continues {
                break;
            }
        }

        let ident = &rest[..len];
        let kind = match Keyword::lookup(ident) {
            Some(keyword) if !self.expects_member_name() => TokenKind::Keyword(keyword),
            _ => TokenKind::Name,
        };
        self.emit(kind, self.pos + len);
    }

    /// Identifiers after `->`, `?->`, `::` and `function` are plain names even
    /// when they spell a keyword (`Foo::class`, `function list()`).
    fn expects_member_name(&self) -> bool {
        let mut significant = self.tokens.iter().rev().filter(|t| !t.is_trivia());
        let Some(last) = significant.next() else {
            return false;
        };
        match last.kind {
            TokenKind::Operator => matches!(&self.src[last.span.clone()], b"->" | b"?->" | b"::"),
            TokenKind::Keyword(Keyword::Function) => true,
            TokenKind::Punct(b'&') => significant
                .next()
                .is_some_and(|t| t.is_keyword(Keyword::Function)),
            _ => false,
        }
    }
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|at| at + from)
}

fn line_comment_len(rest: &[u8]) -> usize {
    let mut len = 0;
    while len < rest.len() {
        if rest[len] == b'\n' || rest[len] == b'\r' || rest[len..].starts_with(b"?>") {
            break;
        }
        len += 1;
    }
    len
}

fn number_len(rest: &[u8]) -> usize {
    let mut len = 0;
    while len < rest.len() {
        let byte = rest[len];
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            let is_exponent = matches!(byte, b'e' | b'E')
                && matches!(rest.get(len + 1), Some(b'+') | Some(b'-'))
                && rest.get(len + 2).is_some_and(|b| b.is_ascii_digit());
            len += if is_exponent { 2 } else { 1 };
        } else if byte == b'.' && rest.get(len + 1).is_some_and(|b| b.is_ascii_digit()) {
            len += 1;
        } else {
            break;
        }
    }
    len
}

fn quoted_len(rest: &[u8], quote: u8) -> usize {
    let mut len = 1;
    while len < rest.len() {
        match rest[len] {
            b'\\' => len += 2,
            b if b == quote => return len + 1,
            _ => len += 1,
        }
    }
    rest.len()
}

/// Length of a heredoc/nowdoc starting at `rest`, including its closing label.
fn heredoc_len(rest: &[u8]) -> Option<usize> {
    if !rest.starts_with(b"<<<") {
        return None;
    }
    let mut at = 3;
    while matches!(rest.get(at), Some(b' ') | Some(b'\t')) {
        at += 1;
    }
    let quote = match rest.get(at) {
        Some(q @ (b'\'' | b'"')) => {
            at += 1;
            Some(*q)
        }
        _ => None,
    };
    let label_start = at;
    if !rest.get(at).is_some_and(|b| is_ident_start(*b)) {
        return None;
    }
    while rest.get(at).is_some_and(|b| is_ident_byte(*b)) {
        at += 1;
    }
    let label = &rest[label_start..at];
    if let Some(q) = quote {
        if rest.get(at) != Some(&q) {
            return None;
        }
        at += 1;
    }
    match rest.get(at) {
        Some(b'\n') => at += 1,
        Some(b'\r') if rest.get(at + 1) == Some(&b'\n') => at += 2,
        _ => return None,
    }

    // Closing label: optional indentation, the label, then a non-identifier byte.
    let mut line_start = at;
    while line_start < rest.len() {
        let mut cursor = line_start;
        while matches!(rest.get(cursor), Some(b' ') | Some(b'\t')) {
            cursor += 1;
        }
        if rest[cursor..].starts_with(label)
            && !rest.get(cursor + label.len()).is_some_and(|b| is_ident_byte(*b))
        {
            return Some(cursor + label.len());
        }
        match find(rest, line_start, b"\n") {
            Some(newline) => line_start = newline + 1,
            None => break,
        }
    }
    Some(rest.len())
}

/// Re-entrant cursor over a token stream.
///
/// The scanner and the extractor both walk tokens with nested loops (argument
/// lists inside declarations, bodies inside classes); each loop owns its own
/// cursor position instead of sharing a mutable index.
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn at(tokens: &'t [Token], pos: usize) -> Self {
        Self { tokens, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// Moves back one token and returns it.
    pub fn retreat(&mut self) -> Option<&'t Token> {
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        self.tokens.get(self.pos)
    }

    /// Next non-trivia token with its index, without moving.
    pub fn peek_significant(&self) -> Option<(usize, &'t Token)> {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .enumerate()
            .find(|(_, t)| !t.is_trivia())
            .map(|(offset, t)| (self.pos + offset, t))
    }

    /// Skips trivia and returns the next significant token, moving past it.
    pub fn advance_significant(&mut self) -> Option<&'t Token> {
        let (index, token) = self.peek_significant()?;
        self.pos = index + 1;
        Some(token)
    }

    /// Previous non-trivia token before the cursor, without moving.
    pub fn previous_significant(&self) -> Option<&'t Token> {
        self.tokens[..self.pos.min(self.tokens.len())]
            .iter()
            .rev()
            .find(|t| !t.is_trivia())
    }
}
