//! DOCX document parser using docx-rs
//!
//! Paragraph text is emitted in document order. Tables are flattened in
//! place, one cell per line, so skills listed in resume tables still reach
//! the scorer.

use std::path::Path;

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// DOCX document parser
#[derive(Debug, Default)]
pub struct DocxParser;

impl DocxParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract text from DOCX bytes
    pub fn extract_from_bytes(&self, bytes: &[u8]) -> Result<String> {
        let docx = read_docx(bytes).map_err(|e| ParserError::Docx(e.to_string()))?;

        let mut lines: Vec<String> = Vec::new();
        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(para) => lines.push(paragraph_text(para)),
                DocumentChild::Table(tbl) => {
                    for row in &tbl.rows {
                        let docx_rs::TableChild::TableRow(tr) = row;
                        for cell in &tr.cells {
                            let docx_rs::TableRowChild::TableCell(tc) = cell;
                            let text: Vec<String> = tc
                                .children
                                .iter()
                                .filter_map(|c| match c {
                                    docx_rs::TableCellContent::Paragraph(p) => {
                                        Some(paragraph_text(p))
                                    }
                                    _ => None,
                                })
                                .collect();
                            lines.push(text.join(" ").trim().to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(lines.join("\n"))
    }
}

/// Concatenated run text of one paragraph
fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

impl DocumentParser for DocxParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let content = self.extract_from_bytes(&bytes)?;
        Ok(ParsedDocument::new(path.display().to_string(), FileType::Docx).with_content(content))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Docx]
    }
}
