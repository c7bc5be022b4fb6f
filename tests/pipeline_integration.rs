use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use httpmock::{Method::POST, MockServer};
use rustyrag::{
    answer::{LLM_ERROR_PREFIX, LlmAnswerGenerator, StubAnswerGenerator},
    embedding::HashEmbeddingClient,
    ingestion::FileParser,
    protocol::{MemorySink, MessageEnvelope, MessageType, agents},
    service::RagService,
};
use serde_json::json;
use tempfile::TempDir;

const DIMENSION: usize = 384;

struct Corpus {
    _dir: TempDir,
    report: PathBuf,
    metrics: PathBuf,
    slides: PathBuf,
}

fn corpus() -> Corpus {
    let dir = tempfile::tempdir().expect("temp dir");
    let report = dir.path().join("report.txt");
    let metrics = dir.path().join("metrics.csv");
    let slides = dir.path().join("deck.pdf");
    fs::write(&report, "Revenue reached $5.2 billion in fiscal 2023.").expect("write report");
    fs::write(&metrics, "metric,value\nchurn,4\nretention,93\n").expect("write csv");
    fs::write(&slides, b"%PDF-1.7 binary").expect("write pdf");
    Corpus {
        _dir: dir,
        report,
        metrics,
        slides,
    }
}

fn stub_service(sink: Arc<MemorySink>) -> RagService {
    RagService::from_parts(
        Arc::new(HashEmbeddingClient::new(DIMENSION)),
        Arc::new(FileParser::new()),
        Arc::new(StubAnswerGenerator),
        sink,
    )
}

fn llm_service(server: &MockServer) -> RagService {
    let generator = LlmAnswerGenerator::new(
        server.url("/v1/llm"),
        "test-key",
        128,
        Duration::from_secs(2),
    )
    .expect("llm client");
    RagService::from_parts(
        Arc::new(HashEmbeddingClient::new(DIMENSION)),
        Arc::new(FileParser::new()),
        Arc::new(generator),
        Arc::new(MemorySink::new()),
    )
}

fn types(messages: &[MessageEnvelope]) -> Vec<MessageType> {
    messages.iter().map(MessageEnvelope::message_type).collect()
}

#[tokio::test]
async fn stub_pipeline_answers_from_uploaded_documents() {
    let docs = corpus();
    let sink = Arc::new(MemorySink::new());
    let service = stub_service(sink.clone());

    let outcome = service
        .run(
            vec![docs.report.clone(), docs.metrics.clone(), docs.slides.clone()],
            "What was revenue in 2023?".into(),
        )
        .await
        .expect("pipeline run");

    assert_eq!(
        outcome.response.answer,
        "(Stub Answer) Revenue in 2023 was $5.2 billion"
    );
    assert_eq!(outcome.response.retrieved.len(), 2);
    let sources: Vec<_> = outcome
        .response
        .retrieved
        .iter()
        .map(|result| result.meta.source_id.as_str())
        .collect();
    assert!(sources.contains(&"report.txt"));
    assert!(sources.contains(&"metrics.csv"));

    assert_eq!(
        types(&outcome.messages),
        vec![
            MessageType::UserQuery,
            MessageType::DocumentParsed,
            MessageType::DocumentParsed,
            MessageType::DocumentParsed,
            MessageType::BuildIndex,
            MessageType::RetrievalResult,
            MessageType::FinalResponse,
        ]
    );
    assert!(outcome.trace_id.starts_with("rag-"));
    assert!(
        outcome
            .messages
            .iter()
            .all(|envelope| envelope.trace_id() == outcome.trace_id)
    );

    let first = &outcome.messages[0];
    assert_eq!(first.sender(), agents::UI);
    assert_eq!(first.receiver(), agents::COORDINATOR);
    assert_eq!(first.payload()["query"], "What was revenue in 2023?");

    assert_eq!(outcome.messages[3].payload()["filename"], "deck.pdf");
    assert_eq!(outcome.messages[3].payload()["n_chunks"], 0);
    assert_eq!(outcome.messages[4].payload()["n_chunks"], 2);

    let last = outcome.messages.last().expect("final envelope");
    assert_eq!(last.sender(), agents::ANSWER);
    assert_eq!(last.receiver(), agents::UI);
    assert_eq!(last.payload()["answer"], outcome.response.answer);

    // The service sink saw the same stream as the per-run recorder.
    assert_eq!(sink.messages().len(), outcome.messages.len());

    let wire = serde_json::to_string(last).expect("serialize envelope");
    let decoded = MessageEnvelope::from_json(&wire).expect("decode envelope");
    assert_eq!(decoded.message_type(), MessageType::FinalResponse);
    assert_eq!(decoded.trace_id(), outcome.trace_id);

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.runs, 1);
    assert_eq!(snapshot.documents_ingested, 3);
    assert_eq!(snapshot.chunks_indexed, 2);
    assert_eq!(snapshot.parse_failures, 1);
}

#[tokio::test]
async fn each_run_starts_from_an_empty_index() {
    let docs = corpus();
    let service = stub_service(Arc::new(MemorySink::new()));

    let first = service
        .run(vec![docs.report.clone()], "revenue?".into())
        .await
        .expect("first run");
    assert_eq!(first.response.retrieved.len(), 1);

    let second = service
        .run(vec![docs.metrics.clone()], "churn?".into())
        .await
        .expect("second run");

    assert_ne!(first.trace_id, second.trace_id);
    assert_eq!(second.response.retrieved.len(), 1);
    assert_eq!(second.response.retrieved[0].meta.source_id, "metrics.csv");
    assert_eq!(service.metrics_snapshot().runs, 2);
}

#[tokio::test]
async fn no_documents_yields_no_context_answer() {
    let service = stub_service(Arc::new(MemorySink::new()));

    let outcome = service
        .run(Vec::new(), "anything?".into())
        .await
        .expect("pipeline run");

    assert_eq!(
        outcome.response.answer,
        "(Stub Answer) No relevant context found."
    );
    assert_eq!(
        types(&outcome.messages),
        vec![
            MessageType::UserQuery,
            MessageType::RetrievalResult,
            MessageType::FinalResponse,
        ]
    );
    assert_eq!(
        outcome.messages[1].payload()["retrieved_context"],
        json!([])
    );
}

#[tokio::test]
async fn llm_backend_answer_is_returned_with_raw_response() {
    let docs = corpus();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/llm")
                .body_contains("### Query:")
                .body_contains("Revenue reached $5.2 billion");
            then.status(200)
                .json_body(json!({ "output": "Revenue in 2023 was $5.2 billion." }));
        })
        .await;
    let service = llm_service(&server);

    let outcome = service
        .run(vec![docs.report.clone()], "What was revenue in 2023?".into())
        .await
        .expect("pipeline run");

    mock.assert_async().await;
    assert_eq!(outcome.response.answer, "Revenue in 2023 was $5.2 billion.");
    let last = outcome.messages.last().expect("final envelope");
    assert_eq!(
        last.payload()["llm_raw"]["output"],
        "Revenue in 2023 was $5.2 billion."
    );
}

#[tokio::test]
async fn llm_backend_failure_is_reported_as_labeled_answer() {
    let docs = corpus();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/llm");
            then.status(503).body("overloaded");
        })
        .await;
    let service = llm_service(&server);

    let outcome = service
        .run(vec![docs.report.clone()], "revenue?".into())
        .await
        .expect("pipeline run still completes");

    assert!(outcome.response.answer.starts_with(LLM_ERROR_PREFIX));
    assert_eq!(outcome.response.retrieved.len(), 1);
    assert_eq!(
        types(&outcome.messages).last(),
        Some(&MessageType::FinalResponse)
    );
    assert_eq!(service.metrics_snapshot().failed_runs, 0);
}
