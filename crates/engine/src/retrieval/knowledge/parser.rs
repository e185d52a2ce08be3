//! Document text extraction for knowledge-base ingestion.

use researchx_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("rst") | Some("org") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Read a document and return its cleaned text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Retrieval(format!("Failed to read {}: {}", path.display(), e)))?;

    let cleaned = match ContentType::from_path(path) {
        ContentType::Markdown => clean_markdown(&raw),
        ContentType::Html => clean_html(&raw),
        ContentType::PlainText => raw.trim().to_string(),
        ContentType::Unknown => {
            if raw.contains('\0') {
                return Err(AppError::Retrieval(format!(
                    "Binary file not supported: {}",
                    path.display()
                )));
            }
            raw.trim().to_string()
        }
    };

    Ok(cleaned)
}

fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }
        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skip_depth = 0usize;
    let lower = text.to_lowercase();

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = lower.get(i..).unwrap_or_default();
            if rest.starts_with("<script") || rest.starts_with("<style") {
                skip_depth += 1;
            } else if rest.starts_with("</script") || rest.starts_with("</style") {
                skip_depth = skip_depth.saturating_sub(1);
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag && skip_depth == 0 {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_path(Path::new("notes.md")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("page.htm")), ContentType::Html);
        assert_eq!(ContentType::from_path(Path::new("paper.txt")), ContentType::PlainText);
        assert_eq!(ContentType::from_path(Path::new("data.bin")), ContentType::Unknown);
    }

    #[test]
    fn test_clean_markdown() {
        let output = clean_markdown("# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text");
        assert!(output.contains("Header"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html_drops_scripts() {
        let input = "<html><head><script>var x = 1;</script></head><body><p>Hello <b>world</b></p></body></html>";
        assert_eq!(clean_html(input), "Hello world");
    }

    #[test]
    fn test_binary_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        fs::write(&path, b"abc\0def").unwrap();
        assert!(parse_file(&path).is_err());
    }
}
