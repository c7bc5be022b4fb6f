//! Ingestion agent: parses documents, chunks their text, and announces the result.

mod office;
mod parser;
mod root;

pub use parser::{CSV_MAX_ROWS, DocumentFormat, DocumentParser, FileParser, ParseError};
pub use root::{DocumentPathError, DocumentRoot};

use crate::{
    chunking::{Chunk, DEFAULT_CHUNK_SIZE, chunk_document},
    protocol::{MessageEnvelope, MessageSink, Payload, agents},
};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

/// Chunks extracted from one document.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    /// Identifier stamped on every chunk.
    pub source_id: String,
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
    /// Parse failure recovered as an empty document, if any.
    pub parse_error: Option<String>,
}

/// Turns files into chunk sequences, tolerating per-document parse failures.
pub struct IngestionAgent {
    parser: Arc<dyn DocumentParser>,
    sink: Arc<dyn MessageSink>,
    chunk_size: NonZeroUsize,
}

impl IngestionAgent {
    /// Build an agent chunking at [`DEFAULT_CHUNK_SIZE`] characters.
    pub fn new(parser: Arc<dyn DocumentParser>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            parser,
            sink,
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Override the chunk length.
    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Parse and chunk one document, emitting `DOCUMENT_PARSED`.
    ///
    /// `filename` defaults to the last component of `path`. A parse failure is logged and the
    /// document contributes zero chunks.
    pub async fn process_document(
        &self,
        path: &Path,
        filename: Option<&str>,
        trace_id: Option<&str>,
    ) -> IngestedDocument {
        let source_id = filename.map(str::to_string).unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        let (text, parse_error) = match self.parser.parse(path).await {
            Ok(text) => (text, None),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse document; continuing with empty text"
                );
                (String::new(), Some(error.to_string()))
            }
        };

        let chunks = match chunk_document(&text, &source_id, self.chunk_size.get()) {
            Ok(chunks) => chunks,
            Err(error) => {
                tracing::warn!(source_id = %source_id, error = %error, "Failed to chunk document");
                Vec::new()
            }
        };

        self.sink.emit(&MessageEnvelope::new(
            agents::INGESTION,
            agents::RETRIEVAL,
            Payload::DocumentParsed {
                filename: source_id.clone(),
                n_chunks: chunks.len(),
            },
            trace_id.map(str::to_string),
        ));
        tracing::info!(source_id = %source_id, chunks = chunks.len(), "Parsed document");

        IngestedDocument {
            source_id,
            chunks,
            parse_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MemorySink, MessageType};
    use async_trait::async_trait;
    use std::io::Write;

    struct FixedParser(Result<String, ()>);

    #[async_trait]
    impl DocumentParser for FixedParser {
        async fn parse(&self, _path: &Path) -> Result<String, ParseError> {
            self.0.clone().map_err(|()| {
                ParseError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt"))
            })
        }
    }

    #[tokio::test]
    async fn chunks_document_and_emits_document_parsed() {
        let sink = Arc::new(MemorySink::new());
        let agent = IngestionAgent::new(Arc::new(FixedParser(Ok("x".repeat(1700)))), sink.clone());

        let document = agent
            .process_document(Path::new("/tmp/uploads/report.txt"), None, Some("trace-9"))
            .await;

        assert_eq!(document.source_id, "report.txt");
        assert!(document.parse_error.is_none());
        let lengths: Vec<usize> = document.chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lengths, vec![800, 800, 100]);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type(), MessageType::DocumentParsed);
        assert_eq!(messages[0].sender(), agents::INGESTION);
        assert_eq!(messages[0].trace_id(), "trace-9");
        assert_eq!(messages[0].payload()["filename"], "report.txt");
        assert_eq!(messages[0].payload()["n_chunks"], 3);
    }

    #[tokio::test]
    async fn parse_failure_yields_empty_document() {
        let sink = Arc::new(MemorySink::new());
        let agent = IngestionAgent::new(Arc::new(FixedParser(Err(()))), sink.clone());

        let document = agent
            .process_document(Path::new("broken.txt"), Some("broken.txt"), None)
            .await;

        assert!(document.chunks.is_empty());
        assert!(document.parse_error.as_deref().unwrap_or_default().contains("corrupt"));
        assert_eq!(sink.messages()[0].payload()["n_chunks"], 0);
    }

    #[tokio::test]
    async fn custom_chunk_size_and_real_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".md")
            .tempfile()
            .expect("tempfile");
        write!(file, "  abcdefghij  ").expect("write");

        let agent = IngestionAgent::new(Arc::new(FileParser::new()), Arc::new(MemorySink::new()))
            .with_chunk_size(NonZeroUsize::new(4).expect("non-zero"));
        let document = agent.process_document(file.path(), Some("notes.md"), None).await;

        let texts: Vec<&str> = document.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
        assert!(document.chunks.iter().all(|c| c.meta.source_id == "notes.md"));
    }
}
