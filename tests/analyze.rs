use arxivdigest::analysis::{analyze_papers, AnalysisResult};
use arxivdigest::llm::{LlmClient, LlmConfig, RetryPolicy};
use arxivdigest::report::{self, group_by_topic};
use arxivdigest::{listing, DateWindow, Paper};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Requests seen per paper title
#[derive(Clone, Default)]
struct MockLlm {
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

fn title_of(body: &Value) -> String {
    body["messages"][1]["content"]
        .as_str()
        .and_then(|prompt| prompt.lines().find_map(|l| l.strip_prefix("Title: ")))
        .unwrap_or_default()
        .to_string()
}

fn answer(content: &str) -> Response {
    Json(json!({
        "id": "chatcmpl-mock",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
    }))
    .into_response()
}

async fn chat(State(mock): State<MockLlm>, Json(body): Json<Value>) -> Response {
    let title = title_of(&body);
    let seen = {
        let mut hits = mock.hits.lock().unwrap();
        let n = hits.entry(title.clone()).or_insert(0);
        *n += 1;
        *n
    };

    match title.as_str() {
        "Flaky Detector" => (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response(),
        "Locked Out" => (StatusCode::UNAUTHORIZED, "bad key").into_response(),
        "Second Try Segmenter" if seen == 1 => {
            (StatusCode::INTERNAL_SERVER_ERROR, "hiccup").into_response()
        }
        "Second Try Segmenter" => answer(
            "RELEVANT: yes\nREASON: Segments images.\nTOPICS: image segmentation\nMAIN_CONTRIBUTION: A mask decoder.",
        ),
        "Fast Detector" => answer(
            "**RELEVANT:** yes\n**REASON:** Detects objects.\n**TOPICS:** Object detection, Robotics\n**MAIN_CONTRIBUTION:** A one-stage detector.",
        ),
        "Panoptic Everything" => answer(
            "RELEVANT: yes\nREASON: Both.\nTOPICS: object detection, image segmentation\nMAIN_CONTRIBUTION: Unified heads.",
        ),
        _ => answer("RELEVANT: no\nREASON: About protein folding.\nTOPICS:\nMAIN_CONTRIBUTION: A folding model."),
    }
}

async fn spawn(mock: MockLlm) -> String {
    let app = Router::new().route("/v1/chat/completions", post(chat)).with_state(mock);
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}/v1", addr)
}

fn client(base_url: String) -> LlmClient {
    LlmClient::new(LlmConfig {
        base_url,
        api_key: "sk-test".to_string(),
        model: "mock-model".to_string(),
    })
    .unwrap()
    .with_retry(RetryPolicy {
        max_attempts: 3,
        delay: Duration::ZERO,
    })
}

fn paper(id: &str, title: &str) -> Paper {
    Paper {
        id: id.to_string(),
        title: title.to_string(),
        authors: vec!["Kaiming He".to_string(), "Ross Girshick".to_string()],
        abstract_text: format!("We present {}.", title),
        published: NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
        categories: vec!["cs.CV".to_string()],
        link: format!("http://arxiv.org/abs/{}v1", id),
        pdf_url: format!("http://arxiv.org/pdf/{}v1", id),
    }
}

fn topics() -> Vec<String> {
    vec!["Object detection".to_string(), "Image segmentation".to_string()]
}

fn window() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 10, 4).unwrap(),
    )
}

#[tokio::test]
async fn retries_transient_failures_and_skips_exhausted_papers() {
    let mock = MockLlm::default();
    let llm = client(spawn(mock.clone()).await);
    let papers = vec![
        paper("2410.00001", "Second Try Segmenter"),
        paper("2410.00002", "Flaky Detector"),
        paper("2410.00003", "Locked Out"),
        paper("2410.00004", "Protein Folding Revisited"),
    ];

    let analysis = analyze_papers(&llm, &papers, &topics()).await;

    assert_eq!(analysis.results.len(), 2);
    assert_eq!(analysis.skipped.len(), 2);
    assert_eq!(analysis.relevant_count(), 1);
    assert!(analysis.results[0].is_relevant_to("Image segmentation"));

    let hits = mock.hits.lock().unwrap().clone();
    assert_eq!(hits["Second Try Segmenter"], 2);
    assert_eq!(hits["Flaky Detector"], 3);
    assert_eq!(hits["Locked Out"], 1, "non-transient errors are not retried");

    // usage is counted for successful answers only
    assert_eq!(analysis.usage.total_tokens, 240);
}

#[tokio::test]
async fn listing_to_report_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let papers = vec![
        paper("2410.00001", "Fast Detector"),
        paper("2410.00002", "Panoptic Everything"),
        paper("2410.00003", "Protein Folding Revisited"),
    ];
    let input = listing::write_listing(dir.path(), &papers, &window()).unwrap();
    let loaded = listing::load_listing(&input).unwrap();
    assert_eq!(loaded, papers);

    let llm = client(spawn(MockLlm::default()).await);
    let analysis = analyze_papers(&llm, &loaded, &topics()).await;

    let output = listing::report_path_for(&input);
    assert_eq!(
        output.file_name().unwrap().to_string_lossy(),
        "analyzed_papers_2024-10-01_to_2024-10-04.md"
    );
    let generated = NaiveDate::from_ymd_opt(2024, 10, 4).unwrap().and_hms_opt(9, 0, 0).unwrap();
    report::write_report(&output, &analysis, &topics(), Some(&window()), generated).unwrap();
    let text = std::fs::read_to_string(&output).unwrap();

    assert!(text.contains("- Total papers analyzed: 3"));
    assert!(text.contains("- Relevant papers found: 2"));
    assert!(text.contains("| [Object detection](#object-detection) | 2 |"));
    assert!(text.contains("| [Image segmentation](#image-segmentation) | 1 |"));

    let by_topic = text.find("## Papers by Topic").unwrap();
    let no_relevance = text.find("## Papers With No Relevance").unwrap();
    assert!(!text[by_topic..no_relevance].contains("Protein Folding Revisited"));
    assert!(text[no_relevance..].contains(
        "- [Protein Folding Revisited](http://arxiv.org/abs/2410.00003v1): About protein folding."
    ));
    // "Robotics" was not requested and never shows up as a topic
    assert!(!text.contains("Robotics"));
}

#[tokio::test]
async fn rerunning_gives_the_same_grouping() {
    let llm = client(spawn(MockLlm::default()).await);
    let papers = vec![
        paper("2410.00001", "Fast Detector"),
        paper("2410.00002", "Panoptic Everything"),
        paper("2410.00003", "Protein Folding Revisited"),
    ];
    let topics = topics();

    let first = analyze_papers(&llm, &papers, &topics).await;
    let second = analyze_papers(&llm, &papers, &topics).await;

    let counts = |results: &[AnalysisResult]| {
        let grouped = group_by_topic(results, &topics);
        (
            grouped.count("Object detection"),
            grouped.count("Image segmentation"),
            grouped.unmatched.len(),
        )
    };
    assert_eq!(counts(&first.results), (2, 1, 1));
    assert_eq!(counts(&first.results), counts(&second.results));
}

#[tokio::test]
async fn csv_export_has_one_row_per_result() {
    let dir = tempfile::TempDir::new().unwrap();
    let llm = client(spawn(MockLlm::default()).await);
    let papers = vec![paper("2410.00001", "Fast Detector"), paper("2410.00003", "Protein Folding Revisited")];

    let analysis = analyze_papers(&llm, &papers, &topics()).await;
    let path = dir.path().join("results.csv");
    report::write_csv(&path, &analysis.results).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "2410.00001");
    assert_eq!(&rows[0][3], "true");
    assert_eq!(&rows[0][4], "Object detection");
    assert_eq!(&rows[1][3], "false");
}
