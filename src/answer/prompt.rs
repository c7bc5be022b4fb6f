use crate::retrieval::RetrievalResult;
use std::fmt::Write as _;

const INSTRUCTION: &str = "You are a helpful assistant. Use only the context below to answer the question. If the answer is not present, say you don't know.";
const CLOSING: &str = "Provide a concise answer, and list which chunk(s) were used as sources (by filename + chunk_index).";

/// Assemble the grounded prompt sent to the answer backend.
pub fn format_prompt(query: &str, retrieved: &[RetrievalResult]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{INSTRUCTION}");
    let _ = writeln!(prompt, "\n### Query:\n{query}\n");
    let _ = writeln!(prompt, "### Context (top chunks):\n");
    for (position, result) in retrieved.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "[Chunk {position}] source={} idx={} score={}\n{}\n---\n",
            result.meta.source_id, result.meta.chunk_index, result.score, result.text
        );
    }
    let _ = write!(prompt, "\n{CLOSING}");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMeta;

    #[test]
    fn lists_every_chunk_with_its_source() {
        let retrieved = vec![
            RetrievalResult {
                score: 0.75,
                text: "Revenue was $4.2 billion in 2023.".into(),
                meta: ChunkMeta {
                    source_id: "annual.pdf".into(),
                    chunk_index: 3,
                },
            },
            RetrievalResult {
                score: 0.5,
                text: "NPS reached 61.".into(),
                meta: ChunkMeta {
                    source_id: "survey.csv".into(),
                    chunk_index: 0,
                },
            },
        ];

        let prompt = format_prompt("What was revenue?", &retrieved);

        assert!(prompt.starts_with(INSTRUCTION));
        assert!(prompt.contains("### Query:\nWhat was revenue?\n"));
        assert!(prompt.contains("[Chunk 0] source=annual.pdf idx=3 score=0.75\nRevenue was $4.2 billion in 2023.\n---"));
        assert!(prompt.contains("[Chunk 1] source=survey.csv idx=0 score=0.5\nNPS reached 61."));
        assert!(prompt.ends_with(CLOSING));
    }

    #[test]
    fn empty_context_still_produces_instructions() {
        let prompt = format_prompt("anything", &[]);
        assert!(prompt.contains("### Context (top chunks):"));
        assert!(!prompt.contains("[Chunk"));
    }
}
