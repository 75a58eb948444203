//! MPA Parser - Document text extraction
//!
//! Turns resumes, job descriptions and knowledge files into plain text.
//! Supported formats:
//! - PDF (`pdf-extract`)
//! - DOCX (`docx-rs`, paragraphs and table cells)
//! - Plain text and Markdown (UTF-8)

pub mod docx;
pub mod pdf;

pub use docx::DocxParser;
pub use pdf::PdfParser;

use mpa_core::AgentError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Parser-specific errors
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF parsing error: {0}")]
    Pdf(String),

    #[error("DOCX parsing error: {0}")]
    Docx(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl ParserError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<ParserError> for AgentError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::Io { path, source } => AgentError::Io {
                path: PathBuf::from(path),
                source,
            },
            other => AgentError::Extraction(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document
// ============================================================================

/// Text extracted from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Source file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Full text content
    pub content: String,

    /// Page count, when the format exposes page breaks
    pub page_count: Option<u32>,
}

impl ParsedDocument {
    pub fn new(file_path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            content: String::new(),
            page_count: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_page_count(mut self, pages: Option<u32>) -> Self {
        self.page_count = pages;
        self
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// True when no visible text was extracted
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "md" | "markdown" => Self::Markdown,
            "txt" | "text" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
            Self::Unknown => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "PDF"),
            Self::Docx => write!(f, "DOCX"),
            Self::Markdown => write!(f, "Markdown"),
            Self::PlainText => write!(f, "Plain Text"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================================================
// Parser Trait and Registry
// ============================================================================

/// A parser for one or more file types
pub trait DocumentParser: Send + Sync {
    /// Extract text from the file at `path`
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;

    /// File types this parser handles
    fn supported_types(&self) -> &[FileType];

    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

/// Dispatches files to parsers by extension
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Registry with the PDF, DOCX and plain-text parsers
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: Vec::new(),
        };
        registry.register(Box::new(PdfParser::new()));
        registry.register(Box::new(DocxParser::new()));
        registry.register(Box::new(PlainTextParser));
        registry
    }

    /// Add a parser; later registrations do not override earlier ones
    pub fn register(&mut self, parser: Box<dyn DocumentParser>) {
        self.parsers.push(parser);
    }

    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    /// Parse a file, choosing the parser from its extension
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        if !path.exists() {
            return Err(ParserError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            ));
        }

        let file_type = FileType::from_path(path);
        let parser = self.find_parser(file_type).ok_or_else(|| {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<none>");
            ParserError::UnsupportedFormat(ext.to_string())
        })?;

        let doc = parser.parse(path)?;
        tracing::debug!(
            path = %path.display(),
            file_type = %doc.file_type,
            chars = doc.char_count(),
            "Document parsed"
        );
        Ok(doc)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a file with the default registry
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedDocument> {
    ParserRegistry::new().parse(path.as_ref())
}

/// Extract only the text of a file
pub fn extract_text(path: impl AsRef<Path>) -> Result<String> {
    parse_file(path).map(|doc| doc.content)
}

// ============================================================================
// Plain Text Parser
// ============================================================================

/// UTF-8 text and Markdown
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::io(path, e))?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ParserError::Encoding(format!(
                "{} is not valid UTF-8 (byte {})",
                path.display(),
                e.utf8_error().valid_up_to()
            ))
        })?;

        let file_type = match FileType::from_path(path) {
            FileType::Markdown => FileType::Markdown,
            _ => FileType::PlainText,
        };

        Ok(ParsedDocument::new(path.display().to_string(), file_type).with_content(content))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("docx"), FileType::Docx);
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("txt"), FileType::PlainText);
        assert_eq!(FileType::from_extension("xlsx"), FileType::Unknown);

        assert_eq!(FileType::from_path(Path::new("cv/resume.Docx")), FileType::Docx);
        assert_eq!(FileType::from_path(Path::new("README")), FileType::Unknown);
    }

    #[test]
    fn test_parse_plain_text_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("resume.txt");
        let md = dir.path().join("notes.md");
        std::fs::write(&txt, "Jane Doe\nSkills\n- Rust").unwrap();
        std::fs::write(&md, "# Notes\n\nTokio runtime").unwrap();

        let doc = parse_file(&txt).unwrap();
        assert_eq!(doc.file_type, FileType::PlainText);
        assert_eq!(doc.content, "Jane Doe\nSkills\n- Rust");
        assert_eq!(doc.word_count(), 5);

        let doc = parse_file(&md).unwrap();
        assert_eq!(doc.file_type, FileType::Markdown);
        assert!(doc.content.contains("Tokio runtime"));
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

        let err = parse_file(&path).unwrap_err();
        assert!(matches!(err, ParserError::Encoding(_)), "got {err:?}");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        std::fs::write(&path, b"not parsed").unwrap();

        match parse_file(&path) {
            Err(ParserError::UnsupportedFormat(ext)) => assert_eq!(ext, "xlsx"),
            other => panic!("expected unsupported format, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_file("/no/such/resume.pdf").unwrap_err();
        assert!(matches!(err, ParserError::Io { .. }));

        let agent: AgentError = err.into();
        assert_eq!(agent.collaborator(), "extraction");
    }

    #[test]
    fn test_conversion_to_agent_error() {
        let agent: AgentError = ParserError::Pdf("bad xref".to_string()).into();
        assert!(matches!(agent, AgentError::Extraction(ref m) if m.contains("bad xref")));
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = ParserRegistry::default();
        assert!(registry.find_parser(FileType::Pdf).is_some());
        assert!(registry.find_parser(FileType::Docx).is_some());
        assert!(registry.find_parser(FileType::Markdown).is_some());
        assert!(registry.find_parser(FileType::Unknown).is_none());
    }
}
