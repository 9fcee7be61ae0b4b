//! Exact source reconstruction of indexed functions.

use super::lexer::{Keyword, SourceFile, TokenCursor, TokenKind};

/// Why a declaration could not be sliced out of its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceError {
    /// No function declaration starts on the expected line.
    DeclarationNotFound,
    /// The declaration never reaches a body end or a terminating `;`.
    Unterminated,
}

/// Token range of a declaration, doc comment included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclarationSpan {
    pub first: usize,
    pub last: usize,
    /// Index of the doc comment token, when one precedes the declaration.
    pub doc_comment: Option<usize>,
}

/// Locates the `function` keyword on `line`.
pub fn find_declaration(file: &SourceFile, line: usize) -> Option<usize> {
    file.tokens
        .iter()
        .position(|t| t.is_keyword(Keyword::Function) && t.line == line)
}

/// Computes the span of the declaration whose `function` keyword is at
/// `keyword_index`.
///
/// Walking backwards, whitespace and visibility/modifier keywords are skipped;
/// a doc comment found there becomes the start of the span, anything else
/// means the declaration has none. Walking forwards, a `;` seen before any
/// `{` ends a bodiless declaration; otherwise the body ends where brace depth
/// returns to zero.
pub fn declaration_span(
    file: &SourceFile,
    keyword_index: usize,
) -> Result<DeclarationSpan, SliceError> {
    let mut first = keyword_index;
    let mut doc_comment = None;
    let mut backwards = TokenCursor::at(&file.tokens, keyword_index);
    while let Some(token) = backwards.retreat() {
        match token.kind {
            TokenKind::Whitespace => continue,
            TokenKind::Keyword(keyword) if keyword.is_modifier() => {
                first = backwards.position();
            }
            TokenKind::DocComment => {
                first = backwards.position();
                doc_comment = Some(first);
                break;
            }
            _ => break,
        }
    }

    let mut forwards = TokenCursor::at(&file.tokens, keyword_index + 1);
    let mut depth = 0usize;
    let mut in_body = false;
    while let Some(token) = forwards.advance() {
        match token.kind {
            TokenKind::Punct(b';') if !in_body => {
                return Ok(DeclarationSpan {
                    first,
                    last: forwards.position() - 1,
                    doc_comment,
                });
            }
            TokenKind::Punct(b'{') => {
                in_body = true;
                depth += 1;
            }
            TokenKind::Punct(b'}') if in_body => {
                depth -= 1;
                if depth == 0 {
                    return Ok(DeclarationSpan {
                        first,
                        last: forwards.position() - 1,
                        doc_comment,
                    });
                }
            }
            _ => {}
        }
    }
    Err(SliceError::Unterminated)
}

/// Source text of the declaration on `line`, from its doc comment (or first
/// modifier) through its closing brace or `;`.
pub fn extract_declaration(file: &SourceFile, line: usize) -> Result<String, SliceError> {
    let keyword_index = find_declaration(file, line).ok_or(SliceError::DeclarationNotFound)?;
    let span = declaration_span(file, keyword_index)?;
    Ok(String::from_utf8_lossy(file.slice(span.first, span.last)).into_owned())
}
