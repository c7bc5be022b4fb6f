//! Offline answerer used when no backend is configured.
//!
//! Rules are tried in order against the concatenated context; the first match produces the
//! answer, otherwise a short preview of the context is returned.

use super::{AnswerError, AnswerGenerator, GeneratedAnswer};
use crate::retrieval::RetrievalResult;
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Prefix marking answers produced without a backend.
pub const STUB_PREFIX: &str = "(Stub Answer)";
/// Answer returned when retrieval produced no context.
pub const NO_CONTEXT_ANSWER: &str = "(Stub Answer) No relevant context found.";

const CONTEXT_RESULTS: usize = 3;
const PREVIEW_CHARS: usize = 400;

/// One extraction rule: a pattern plus the sentence built from its captures.
struct ExtractionRule {
    pattern: Regex,
    render: fn(&Captures<'_>) -> String,
}

impl ExtractionRule {
    fn new(pattern: &str, render: fn(&Captures<'_>) -> String) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("extraction rule pattern must compile"),
            render,
        }
    }
}

static RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    vec![
        ExtractionRule::new(r"(\$[0-9.]+\s*billion).*2023", |caps| {
            format!("Revenue in 2023 was {}", &caps[1])
        }),
        ExtractionRule::new(r"(\$[0-9.]+\s*billion).*2024", |caps| {
            format!("Revenue in 2024 was {}", &caps[1])
        }),
        ExtractionRule::new(r"(?i)CAC.*?(\$[0-9]+)", |caps| {
            format!("Customer Acquisition Cost was {}", &caps[1])
        }),
        ExtractionRule::new(r"(?i)NPS.*?(\d{2})", |caps| {
            format!("Net Promoter Score was {}", &caps[1])
        }),
        ExtractionRule::new(r"(?i)Retention rate was (\d+)%", |caps| {
            format!("Retention rate was {}%", &caps[1])
        }),
        ExtractionRule::new(r"(?i)churn rate (decreased to|was) (\d+)%", |caps| {
            format!("Churn rate was {}%", &caps[2])
        }),
        ExtractionRule::new(r"(?i)Employee satisfaction.*?(\d+)%", |caps| {
            format!("Employee satisfaction score was {}%", &caps[1])
        }),
        ExtractionRule::new(r"(?i)carbon footprint.*?(\d+)%", |caps| {
            format!("Carbon footprint reduced by {}%", &caps[1])
        }),
    ]
});

/// Extract a known metric from `text`, falling back to a preview of the text.
pub fn extract_stub_answer(text: &str) -> String {
    let body = RULES
        .iter()
        .find_map(|rule| rule.pattern.captures(text).map(|caps| (rule.render)(&caps)))
        .unwrap_or_else(|| {
            text.chars()
                .take(PREVIEW_CHARS)
                .collect::<String>()
                .replace('\n', " ")
        });
    format!("{STUB_PREFIX} {body}")
}

/// Answer generator that never leaves the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubAnswerGenerator;

#[async_trait]
impl AnswerGenerator for StubAnswerGenerator {
    async fn answer(
        &self,
        _query: &str,
        retrieved: &[RetrievalResult],
    ) -> Result<GeneratedAnswer, AnswerError> {
        if retrieved.is_empty() {
            return Ok(GeneratedAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                raw: None,
            });
        }

        let context = retrieved
            .iter()
            .take(CONTEXT_RESULTS)
            .map(|result| result.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(GeneratedAnswer {
            answer: extract_stub_answer(&context),
            raw: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMeta;

    fn result(text: &str) -> RetrievalResult {
        RetrievalResult {
            score: 1.0,
            text: text.into(),
            meta: ChunkMeta {
                source_id: "doc".into(),
                chunk_index: 0,
            },
        }
    }

    #[test]
    fn extracts_metrics_in_priority_order() {
        let cases = [
            (
                "Total revenue reached $4.2 billion in fiscal 2023.",
                "(Stub Answer) Revenue in 2023 was $4.2 billion",
            ),
            (
                "Revenue hit $5 billion during 2024",
                "(Stub Answer) Revenue in 2024 was $5 billion",
            ),
            (
                "Our cac fell to $120 per customer.",
                "(Stub Answer) Customer Acquisition Cost was $120",
            ),
            ("The NPS score is 72 this quarter.", "(Stub Answer) Net Promoter Score was 72"),
            ("Retention rate was 91% overall.", "(Stub Answer) Retention rate was 91%"),
            ("The churn rate decreased to 4% last year.", "(Stub Answer) Churn rate was 4%"),
            (
                "Employee satisfaction rose to 88% in the survey.",
                "(Stub Answer) Employee satisfaction score was 88%",
            ),
            (
                "Our carbon footprint dropped by 15% since launch.",
                "(Stub Answer) Carbon footprint reduced by 15%",
            ),
        ];

        for (text, expected) in cases {
            assert_eq!(extract_stub_answer(text), expected, "text: {text}");
        }
    }

    #[test]
    fn earlier_rules_win_over_later_ones() {
        let text = "NPS was 55 and revenue was $3.1 billion in 2023.";
        assert_eq!(
            extract_stub_answer(text),
            "(Stub Answer) Revenue in 2023 was $3.1 billion"
        );
    }

    #[test]
    fn falls_back_to_flattened_preview() {
        let text = format!("line one\nline two\n{}", "z".repeat(600));
        let answer = extract_stub_answer(&text);
        let body = answer.strip_prefix("(Stub Answer) ").expect("prefix");
        assert_eq!(body.chars().count(), PREVIEW_CHARS);
        assert!(body.starts_with("line one line two "));
    }

    #[tokio::test]
    async fn empty_context_yields_no_context_answer() {
        let answer = StubAnswerGenerator
            .answer("What was revenue?", &[])
            .await
            .expect("answer");
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.raw.is_none());
    }

    #[tokio::test]
    async fn only_first_three_results_are_considered() {
        let retrieved = vec![
            result("alpha"),
            result("beta"),
            result("gamma"),
            result("Retention rate was 99%"),
        ];
        let answer = StubAnswerGenerator
            .answer("retention?", &retrieved)
            .await
            .expect("answer");
        assert_eq!(answer.answer, "(Stub Answer) alpha beta gamma");
    }
}
