//! Format-dispatching document parser.

use super::office;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Maximum number of CSV records kept per file.
pub const CSV_MAX_ROWS: usize = 50;

/// Errors raised while extracting text from a document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
    /// The CSV reader rejected the file.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    /// An Office document is not a readable zip package or lacks its body part.
    #[error("Failed to open Office document: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// An Office document part is not well-formed XML.
    #[error("Failed to parse Office XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// The PDF extractor rejected the file.
    #[error("Failed to extract PDF text: {0}")]
    Extraction(String),
}

/// Extracts plain text from a document on disk.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Return the document's text content.
    async fn parse(&self, path: &Path) -> Result<String, ParseError>;
}

/// Supported document kinds, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Plain text, Markdown, or any unrecognised extension.
    Text,
    /// Comma-separated values.
    Csv,
    /// Portable Document Format.
    Pdf,
    /// Word document (`.docx`).
    Docx,
    /// PowerPoint deck (`.pptx`, or `.ppt` when it is an Open XML package).
    Pptx,
}

impl DocumentFormat {
    /// Classify a path by its lowercase extension.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Self::Csv,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" | "ppt" => Self::Pptx,
            _ => Self::Text,
        }
    }
}

/// Default parser: reads text files verbatim, truncates CSV files to their first rows, and
/// extracts the text layer of PDF, Word and PowerPoint files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileParser;

impl FileParser {
    /// Construct the parser.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for FileParser {
    async fn parse(&self, path: &Path) -> Result<String, ParseError> {
        match DocumentFormat::from_path(path) {
            DocumentFormat::Text => {
                let bytes = tokio::fs::read(path).await?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            DocumentFormat::Csv => {
                let bytes = tokio::fs::read(path).await?;
                csv_head(&bytes, CSV_MAX_ROWS)
            }
            DocumentFormat::Pdf => {
                let bytes = tokio::fs::read(path).await?;
                extract_blocking(move || {
                    pdf_extract::extract_text_from_mem(&bytes)
                        .map_err(|error| ParseError::Extraction(error.to_string()))
                })
                .await
            }
            DocumentFormat::Docx => {
                let bytes = tokio::fs::read(path).await?;
                extract_blocking(move || office::docx_text(&bytes)).await
            }
            DocumentFormat::Pptx => {
                let bytes = tokio::fs::read(path).await?;
                extract_blocking(move || office::pptx_text(&bytes)).await
            }
        }
    }
}

/// Run a CPU-bound extractor off the async runtime.
async fn extract_blocking<F>(extract: F) -> Result<String, ParseError>
where
    F: FnOnce() -> Result<String, ParseError> + Send + 'static,
{
    tokio::task::spawn_blocking(extract)
        .await
        .map_err(|error| ParseError::Extraction(format!("extractor task failed: {error}")))?
}

/// Re-serialize the header and the first `max_rows` records of a CSV document.
fn csv_head(bytes: &[u8], max_rows: usize) -> Result<String, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_byte_record(reader.byte_headers()?)?;
    for record in reader.byte_records().take(max_rows) {
        writer.write_byte_record(&record?)?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|error| ParseError::Io(error.into_error()))?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::office::fixtures::{package, slide, word_document};
    use std::io::Write;

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.CSV")), DocumentFormat::Csv);
        assert_eq!(DocumentFormat::from_path(Path::new("a.md")), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_path(Path::new("a.Pdf")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(Path::new("memo.DOCX")), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_path(Path::new("deck.pptx")), DocumentFormat::Pptx);
        assert_eq!(DocumentFormat::from_path(Path::new("deck.ppt")), DocumentFormat::Pptx);
        assert_eq!(DocumentFormat::from_path(Path::new("noext")), DocumentFormat::Text);
    }

    #[test]
    fn csv_head_keeps_header_and_first_rows() {
        let mut raw = String::from("year,revenue\n");
        for year in 0..80 {
            raw.push_str(&format!("{year},{}\n", year * 10));
        }

        let text = csv_head(raw.as_bytes(), CSV_MAX_ROWS).expect("csv");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), CSV_MAX_ROWS + 1);
        assert_eq!(lines[0], "year,revenue");
        assert_eq!(lines[1], "0,0");
        assert_eq!(lines[50], "49,490");
    }

    #[tokio::test]
    async fn parses_text_files_lossily() {
        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("tempfile");
        file.write_all(b"Revenue \xFFgrew").expect("write");

        let text = FileParser::new().parse(file.path()).await.expect("parse");
        assert_eq!(text, "Revenue \u{FFFD}grew");
    }

    fn tempfile_with(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("tempfile");
        file.write_all(bytes).expect("write");
        file
    }

    #[tokio::test]
    async fn extracts_word_paragraphs() {
        let document = word_document(&["Q3 revenue grew 12%", "", "Churn fell to 4%"]);
        let file = tempfile_with(".docx", &package(&[("word/document.xml", &document)]));

        let text = FileParser::new().parse(file.path()).await.expect("parse");
        assert_eq!(text, "Q3 revenue grew 12%\nChurn fell to 4%");
    }

    #[tokio::test]
    async fn extracts_slides_separated_by_blank_lines() {
        let deck = package(&[
            ("ppt/slides/slide1.xml", &slide(&["Roadmap", "Launch in May"])),
            ("ppt/slides/slide2.xml", &slide(&["Risks"])),
        ]);
        let file = tempfile_with(".pptx", &deck);

        let text = FileParser::new().parse(file.path()).await.expect("parse");
        assert_eq!(text, "Roadmap\nLaunch in May\n\nRisks");
    }

    #[tokio::test]
    async fn legacy_binary_presentation_is_an_archive_error() {
        let file = tempfile_with(".ppt", b"\xD0\xCF\x11\xE0 legacy compound file");
        let error = FileParser::new()
            .parse(file.path())
            .await
            .expect_err("legacy ppt");
        assert!(matches!(error, ParseError::Archive(_)));
    }

    #[tokio::test]
    async fn malformed_pdf_is_an_extraction_error() {
        let file = tempfile_with(".pdf", b"%PDF-1.7 not really a document");
        let error = FileParser::new()
            .parse(file.path())
            .await
            .expect_err("malformed pdf");
        assert!(matches!(error, ParseError::Extraction(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let error = FileParser::new()
            .parse(Path::new("/definitely/not/here.txt"))
            .await
            .expect_err("missing");
        assert!(matches!(error, ParseError::Io(_)));
    }
}
