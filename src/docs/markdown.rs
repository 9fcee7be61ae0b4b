//! Markdown helpers for documentation pages: titles, descriptions and the
//! plain-text normalisation used for descriptions and duplicate detection.

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

pub const MAX_DESCRIPTION_CHARS: usize = 255;

lazy_static! {
    static ref FRONT_MATTER_RE: Regex =
        Regex::new(r"(?s)^---\s*.*?---\s*").expect("Failed to compile front matter pattern");
    static ref FRONT_MATTER_BLOCK_RE: Regex = Regex::new(r"(?s)^---\s*\n(.*?)\n---\s*\n")
        .expect("Failed to compile front matter block pattern");
    static ref FRONT_MATTER_TITLE_RE: Regex =
        Regex::new(r"(?m)^title:\s*(.*)").expect("Failed to compile title pattern");
    static ref H1_RE: Regex = Regex::new(r"(?m)^#\s+(.*)").expect("Failed to compile H1 pattern");
    static ref H1_LINE_RE: Regex =
        Regex::new(r"(?m)^#\s+.*\n").expect("Failed to compile H1 line pattern");
    static ref PARAGRAPH_SPLIT_RE: Regex =
        Regex::new(r"\n\s*\n").expect("Failed to compile paragraph pattern");
    static ref NOTE_BLOCK_RE: Regex = Regex::new(r"(?s)\{% note.*?%\}.*?\{% endnote %\}")
        .expect("Failed to compile note block pattern");
    static ref CUT_BLOCK_RE: Regex = Regex::new(r"(?s)\{% cut.*?%\}.*?\{% endcut %\}")
        .expect("Failed to compile cut block pattern");
    static ref FENCED_DIRECTIVE_RE: Regex =
        Regex::new(r"(?s):::[a-z]+.*?:::").expect("Failed to compile directive pattern");
    static ref IMAGE_RE: Regex = Regex::new(r"!\[.*?\]\(.*?\)(?:\{.*?\})?")
        .expect("Failed to compile image pattern");
    static ref LINK_RE: Regex =
        Regex::new(r"\[([^\]]+)\]\([^\)]+\)").expect("Failed to compile link pattern");
    static ref HEADING_MARK_RE: Regex =
        Regex::new(r"#+\s*").expect("Failed to compile heading pattern");
    static ref MULTI_SPACE_RE: Regex =
        Regex::new(r"\s{2,}").expect("Failed to compile whitespace pattern");
    static ref HASH_NOISE_RE: Regex =
        Regex::new(r"[\s\p{P}]+").expect("Failed to compile hash noise pattern");
}

/// Strips markup and collapses whitespace into a single line of text.
pub fn normalize(text: &str) -> String {
    let text = FRONT_MATTER_RE.replace(text, "");
    let text = NOTE_BLOCK_RE.replace_all(&text, "");
    let text = CUT_BLOCK_RE.replace_all(&text, "");
    let text = FENCED_DIRECTIVE_RE.replace_all(&text, "");
    let text = IMAGE_RE.replace_all(&text, "");
    let text = LINK_RE.replace_all(&text, "");
    let text = HEADING_MARK_RE.replace_all(&text, "");
    let text = text.replace(['*', '`'], "").replace(['\n', '\t'], " ");
    MULTI_SPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Front matter `title:`, else the first level-one heading, else the file stem.
pub fn extract_title(content: &str, path: &Path) -> String {
    if let Some(yaml) = FRONT_MATTER_BLOCK_RE
        .captures(content)
        .and_then(|c| c.get(1))
    {
        if let Some(title) = FRONT_MATTER_TITLE_RE
            .captures(yaml.as_str())
            .and_then(|c| c.get(1))
        {
            return title.as_str().trim().to_string();
        }
    }
    if let Some(heading) = H1_RE.captures(content).and_then(|c| c.get(1)) {
        return heading.as_str().trim().to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First paragraph after the title, normalised and capped at
/// [`MAX_DESCRIPTION_CHARS`] characters.
pub fn extract_description(content: &str) -> String {
    let without_meta = FRONT_MATTER_RE.replace(content, "");
    let without_title = H1_LINE_RE.replace_all(&without_meta, "");
    let first_paragraph = PARAGRAPH_SPLIT_RE
        .split(without_title.trim())
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or_default();
    if first_paragraph.is_empty() {
        return String::new();
    }

    let description = normalize(first_paragraph);
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        let cut: String = description
            .chars()
            .take(MAX_DESCRIPTION_CHARS - 3)
            .collect();
        format!("{}...", cut)
    } else {
        description
    }
}

/// Hash of the normalised, lower-cased text with whitespace and punctuation
/// removed. Pages that differ only in markup share a hash.
pub fn content_hash(content: &str) -> String {
    let normalized = normalize(content).to_lowercase();
    let stripped = HASH_NOISE_RE.replace_all(&normalized, "");
    Sha256::digest(stripped.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "---\ntitle: Loader basics\nauthor: x\n---\n# Ignored heading\n\nThe **Loader** class [docs](./loader.md) includes modules.\nSecond line.\n\n## Next\n\nMore text.\n";

    #[test]
    fn title_prefers_front_matter_then_heading_then_stem() {
        assert_eq!(extract_title(PAGE, Path::new("a/b.md")), "Loader basics");
        assert_eq!(
            extract_title("# Heading one\ntext", Path::new("a/b.md")),
            "Heading one"
        );
        assert_eq!(extract_title("plain text", Path::new("a/events.md")), "events");
    }

    #[test]
    fn description_is_first_paragraph_without_markup() {
        assert_eq!(
            extract_description(PAGE),
            "The Loader class includes modules. Second line."
        );
        assert_eq!(extract_description("# Only a title\n"), "");
    }

    #[test]
    fn long_description_is_truncated_with_ellipsis() {
        let long = "word ".repeat(100);
        let description = extract_description(&long);
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn normalize_drops_directives_and_images() {
        let text = "Intro {% note info %}hidden{% endnote %} ![](img.png){width=10} `code` *bold*\n\n:::quote\nq\n:::\nend";
        assert_eq!(normalize(text), "Intro code bold end");
    }

    #[test]
    fn hash_ignores_markup_case_and_punctuation() {
        assert_eq!(
            content_hash("# Hello, World!\n\nSome *text*."),
            content_hash("hello world\nsome text")
        );
        assert_ne!(content_hash("hello"), content_hash("goodbye"));
    }
}
