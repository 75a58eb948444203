//! PDF document parser using pdf-extract

use std::path::Path;

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// Form feed emitted by pdf-extract between pages
const PAGE_BREAK: char = '\x0C';

/// PDF document parser
#[derive(Debug, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract text and a page estimate from PDF bytes
    pub fn extract_from_bytes(&self, bytes: &[u8]) -> Result<(String, Option<u32>)> {
        let raw = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ParserError::Pdf(e.to_string()))?;

        let breaks = raw.matches(PAGE_BREAK).count() as u32;
        let page_count = (breaks > 0).then_some(breaks + 1);

        Ok((normalize(&raw), page_count))
    }
}

/// Replace page breaks with newlines and drop trailing whitespace on each line
fn normalize(raw: &str) -> String {
    raw.replace(PAGE_BREAK, "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let (content, page_count) = self.extract_from_bytes(&bytes)?;
        if content.is_empty() {
            tracing::warn!(path = %path.display(), "PDF contains no extractable text");
        }

        Ok(ParsedDocument::new(path.display().to_string(), FileType::Pdf)
            .with_content(content)
            .with_page_count(page_count))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}
