use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tower::ServiceExt;

use compliance_flow::llm::RecordedCall;
use compliance_flow::{
    AnalysisPipeline, FlowConfig, FlowError, MockLanguageModel, PdfStyle, SpeechSynthesizer,
    VoiceConfig,
};
use compliance_service::{AppState, build_router};

struct StubSpeech {
    payload: Option<String>,
}

#[async_trait]
impl SpeechSynthesizer for StubSpeech {
    async fn synthesize(&self, _text: &str, _voice: &VoiceConfig) -> compliance_flow::Result<String> {
        self.payload
            .clone()
            .ok_or_else(|| FlowError::Speech("quota exceeded".to_string()))
    }
}

/// Summaries echo their document; the general synthesis files "fully met"
/// topics under best practices and "not met" topics under improvements.
fn inspection_model() -> MockLanguageModel {
    MockLanguageModel::new(|call| {
        if let RecordedCall::Chat(request) = call {
            return Ok(format!("## Answer\n- You asked: {}", request.message));
        }

        let text = call.text();
        if let Some((_, body)) = text.split_once("INSPECTION REPORT:\n") {
            return Ok(format!("- {}", body));
        }

        let corpus = text.to_lowercase();
        let strengths = if corpus.contains("infection control fully met") {
            "- Infection control"
        } else {
            "- None recorded"
        };
        let gaps = if corpus.contains("safeguarding training not met") {
            "- Safeguarding training"
        } else {
            "- None recorded"
        };

        if text.contains("TARGET REPORT:") {
            Ok(json!({
                "programName": "ignored",
                "executiveSummary": "Compliant overall.",
                "strengths": strengths,
                "areasForImprovement": gaps,
                "recommendations": "1. Refresh safeguarding training"
            })
            .to_string())
        } else {
            Ok(format!(
                "## Best Practices\n{}\n\n## Areas for Improvement\n{}",
                strengths, gaps
            ))
        }
    })
}

fn app_with(model: MockLanguageModel, speech: StubSpeech) -> (Router, AppState) {
    let config = FlowConfig::default().with_batching(5, Duration::ZERO);
    let pipeline = AnalysisPipeline::new(Arc::new(model), config);
    let state = AppState::new(
        pipeline,
        Arc::new(speech),
        VoiceConfig::default(),
        PdfStyle::default(),
    );
    (build_router(state.clone()), state)
}

fn app() -> (Router, AppState) {
    let pcm = STANDARD.encode([0u8, 0, 0, 64]);
    app_with(inspection_model(), StubSpeech { payload: Some(pcm) })
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec(), content_type)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body, _) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn upload_body(files: &[(&str, &str)]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|(name, content)| {
            json!({
                "name": name,
                "mediaType": if name.ends_with(".png") { "image/png" } else { "text/plain" },
                "contentBase64": STANDARD.encode(content)
            })
        })
        .collect();
    json!({ "files": files })
}

async fn upload_inspections(app: &Router) {
    let (status, _) = send_json(
        app,
        json_request(
            "POST",
            "/documents",
            upload_body(&[
                ("A", "Infection control fully met. Staff training fully met."),
                ("B", "Safeguarding training not met."),
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_check_works() {
    let (app, _) = app();
    let (status, body) = send_json(&app, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn upload_accepts_valid_subset_and_names_rejects() {
    let (app, _) = app();
    let (status, body) = send_json(
        &app,
        json_request(
            "POST",
            "/documents",
            upload_body(&[("a.txt", "A"), ("photo.png", "x"), ("a.txt", "again")]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], json!(["a.txt"]));
    assert_eq!(body["duplicates"], json!(["a.txt"]));
    assert_eq!(
        body["error"],
        "Invalid file type for: photo.png. Only .txt, .md, and .pdf are allowed."
    );

    let (_, listing) = send_json(&app, empty_request("GET", "/documents")).await;
    assert_eq!(listing["documents"], json!(["a.txt"]));
}

#[tokio::test]
async fn invalid_base64_is_a_bad_request() {
    let (app, _) = app();
    let request = json_request(
        "POST",
        "/documents",
        json!({ "files": [{ "name": "a.txt", "contentBase64": "***" }] }),
    );
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analysis_without_documents_is_rejected_before_any_model_call() {
    let model = inspection_model();
    let (app, _) = app_with(model.clone(), StubSpeech { payload: None });

    let (status, body) = send_json(&app, empty_request("POST", "/analysis")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at least one document"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn general_analysis_then_chat() {
    let (app, _) = app();
    upload_inspections(&app).await;

    let (status, body) = send_json(&app, empty_request("POST", "/analysis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "general");
    let result = &body["result"];
    assert!(result["areasForImprovement"].as_str().unwrap().to_lowercase().contains("safeguarding"));
    assert!(result["bestPractices"].as_str().unwrap().to_lowercase().contains("infection control"));

    let (_, chat) = send_json(&app, empty_request("GET", "/chat")).await;
    assert_eq!(chat["transcript"].as_array().unwrap().len(), 1);
    assert_eq!(chat["transcript"][0]["role"], "assistant");

    let (status, reply) = send_json(
        &app,
        json_request("POST", "/chat", json!({ "message": "How do we fix safeguarding?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["reply"]["content"], "## Answer\n- You asked: How do we fix safeguarding?");
    assert_eq!(reply["transcript"].as_array().unwrap().len(), 3);

    let (status, _) = send_json(&app, json_request("POST", "/chat", json!({ "message": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn removing_a_document_discards_report_and_chat() {
    let (app, _) = app();
    upload_inspections(&app).await;
    send_json(&app, empty_request("POST", "/analysis")).await;

    let (status, _) = send_json(&app, empty_request("DELETE", "/documents/B")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app, empty_request("GET", "/chat")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, status_body) = send_json(&app, empty_request("GET", "/status")).await;
    assert_eq!(status_body["report"], Value::Null);

    let (status, _) = send_json(&app, empty_request("DELETE", "/documents/B")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guidelines_need_a_target_and_export_as_pdf() {
    let (app, _) = app();
    upload_inspections(&app).await;

    let (status, _) = send_json(&app, empty_request("POST", "/guidelines")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, empty_request("GET", "/guidelines/pdf")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, json_request("PUT", "/target", json!({ "name": "A" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&app, empty_request("POST", "/guidelines")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["programName"], "A");
    assert!(body["result"]["areasForImprovement"].as_str().unwrap().contains("Safeguarding"));

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/guidelines/pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"GDC_Report_A.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn unknown_target_is_a_bad_request() {
    let (app, _) = app();
    upload_inspections(&app).await;
    let (status, _) = send_json(&app, json_request("PUT", "/target", json!({ "name": "Z" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn synthesis_failure_is_a_bad_gateway() {
    let model = MockLanguageModel::new(|call| {
        if call.text().contains("REPORT SUMMARIES:") {
            Err(FlowError::Llm("upstream 500".to_string()))
        } else {
            Ok("summary".to_string())
        }
    });
    let (app, _) = app_with(model, StubSpeech { payload: None });
    upload_inspections(&app).await;

    let (status, body) = send_json(&app, empty_request("POST", "/analysis")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to generate the report. Please try again.");

    let (_, status_body) = send_json(&app, empty_request("GET", "/status")).await;
    assert_eq!(status_body["busy"], false);
}

#[tokio::test]
async fn failed_new_run_leaves_no_stale_report_or_chat() {
    let model = MockLanguageModel::new(|call| {
        if let RecordedCall::Chat(_) = call {
            return Ok("## Answer\n- ok".to_string());
        }
        let text = call.text();
        if text.contains("TARGET REPORT:") {
            Err(FlowError::Llm("upstream 500".to_string()))
        } else if text.contains("REPORT SUMMARIES:") {
            Ok("## Best Practices\n- Audits\n\n## Areas for Improvement\n- Training".to_string())
        } else {
            Ok("summary".to_string())
        }
    });
    let (app, _) = app_with(model, StubSpeech { payload: None });
    upload_inspections(&app).await;

    let (status, _) = send_json(&app, empty_request("POST", "/analysis")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, empty_request("GET", "/chat")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app, json_request("PUT", "/target", json!({ "name": "A" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, empty_request("POST", "/guidelines")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = send_json(&app, empty_request("GET", "/chat")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, status_body) = send_json(&app, empty_request("GET", "/status")).await;
    assert_eq!(status_body["report"], Value::Null);
    assert_eq!(status_body["busy"], false);
}

#[tokio::test]
async fn in_flight_run_blocks_second_run_and_uploads() {
    let (app, state) = app();
    upload_inspections(&app).await;

    let guard = state.workspace.lock().await.try_begin_run().unwrap();

    let (status, _) = send_json(&app, empty_request("POST", "/analysis")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send_json(
        &app,
        json_request("POST", "/documents", upload_body(&[("c.txt", "C")])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, status_body) = send_json(&app, empty_request("GET", "/status")).await;
    assert_eq!(status_body["busy"], true);

    drop(guard);
    let (status, _) = send_json(&app, empty_request("POST", "/analysis")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn narration_returns_wav_or_error_status() {
    let (app, _) = app();
    upload_inspections(&app).await;

    let (status, _) = send_json(&app, empty_request("POST", "/speech/best-practices")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send_json(&app, empty_request("POST", "/analysis")).await;
    let (status, body, content_type) = send(&app, empty_request("POST", "/speech/best-practices")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("audio/wav"));
    assert_eq!(&body[..4], b"RIFF");
    assert_eq!(body.len(), 44 + 4);

    let (_, status_body) = send_json(&app, empty_request("GET", "/status")).await;
    assert_eq!(status_body["narration"]["bestPractices"], "playing");

    let (status, _) = send_json(&app, empty_request("POST", "/speech/summary")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_narration_surfaces_as_error_status() {
    let (app, _) = app_with(inspection_model(), StubSpeech { payload: None });
    upload_inspections(&app).await;
    send_json(&app, empty_request("POST", "/analysis")).await;

    let (status, body) = send_json(&app, empty_request("POST", "/speech/areas-for-improvement")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");

    let (_, status_body) = send_json(&app, empty_request("GET", "/status")).await;
    assert_eq!(status_body["narration"]["areasForImprovement"], "error");
    assert_eq!(status_body["narration"]["bestPractices"], "idle");
}
