use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use compliance_flow::report::{GENERAL_GREETING, GUIDELINE_GREETING};
use compliance_flow::{
    AnalysisPipeline, FlowError, GeminiSpeech, IncomingFile, LanguageModel, NarrationSection,
    OpenRouterModel, PdfStyle, Report, SpeechSynthesizer, TtsStatus, VoiceConfig, Workspace,
    narrate, render_report,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::models::{
    ChatRequest, ChatResponse, DocumentsResponse, SelectTargetRequest, StatusResponse,
    UploadRequest, UploadResponse,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
}

fn conflict_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn bad_gateway_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn flow_error(err: FlowError) -> ApiError {
    match &err {
        FlowError::InvalidInput(message) => bad_request_error(message),
        FlowError::UnsupportedMediaType(_) | FlowError::DocumentRead { .. } => {
            bad_request_error(&err.to_string())
        }
        FlowError::Busy => conflict_error("An analysis is already in progress. Please wait for it to finish."),
        FlowError::Llm(_) | FlowError::MalformedResponse(_) => bad_gateway_error(
            "Failed to generate the report. Please try again.",
            &err.to_string(),
        ),
        FlowError::Speech(_) | FlowError::PdfRender(_) => {
            internal_error("The request could not be completed", &err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Mutex<Workspace>>,
    pub pipeline: AnalysisPipeline,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub voice: VoiceConfig,
    pub pdf_style: PdfStyle,
}

impl AppState {
    pub fn new(
        pipeline: AnalysisPipeline,
        speech: Arc<dyn SpeechSynthesizer>,
        voice: VoiceConfig,
        pdf_style: PdfStyle,
    ) -> Self {
        Self {
            workspace: Arc::new(Mutex::new(Workspace::new())),
            pipeline,
            speech,
            voice,
            pdf_style,
        }
    }

    fn chat_budget(&self) -> usize {
        self.pipeline.config().chat_context_char_budget
    }
}

pub fn create_app(config: &ServiceConfig) -> Router {
    build_router(create_app_state(config))
}

fn create_app_state(config: &ServiceConfig) -> AppState {
    let model: Arc<dyn LanguageModel> =
        Arc::new(OpenRouterModel::new(&config.openrouter_api_key, &config.llm_model));
    let pipeline = AnalysisPipeline::new(model, config.flow_config());

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set, narration requests will fail");
    }
    let speech = Arc::new(GeminiSpeech::new(
        config.gemini_api_key.clone().unwrap_or_default(),
        &config.tts_model,
    ));

    AppState::new(
        pipeline,
        speech,
        VoiceConfig {
            voice_name: config.tts_voice.clone(),
        },
        PdfStyle::with_brand(&config.brand_name),
    )
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route(
            "/documents",
            get(list_documents).post(upload_documents).delete(clear_documents),
        )
        .route("/documents/{name}", delete(remove_document))
        .route("/target", put(select_target))
        .route("/analysis", post(run_analysis))
        .route("/guidelines", post(generate_guidelines))
        .route("/guidelines/pdf", get(download_pdf))
        .route("/chat", get(get_chat).post(send_chat))
        .route("/speech/{section}", post(narrate_section))
        .route("/status", get(get_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "GDC Compliance Analysis Service",
        "version": "1.0.0",
        "description": "Map-reduce analysis of dental inspection reports with a follow-up assistant",
        "endpoints": {
            "GET /documents": "List uploaded documents and the selected target",
            "POST /documents": "Upload .txt, .md or .pdf documents",
            "DELETE /documents": "Remove every document",
            "DELETE /documents/{name}": "Remove one document",
            "PUT /target": "Select the program to generate guidelines for",
            "POST /analysis": "Run the general two-section analysis",
            "POST /guidelines": "Generate specific guidelines for the selected target",
            "GET /guidelines/pdf": "Download the guideline report as PDF",
            "GET /chat": "Chat transcript for the current report",
            "POST /chat": "Ask the assistant about the current report",
            "POST /speech/{section}": "Narrate best-practices or areas-for-improvement",
            "GET /status": "Progress of the running analysis",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn documents_response(workspace: &Workspace) -> DocumentsResponse {
    DocumentsResponse {
        documents: workspace.documents().names(),
        target: workspace.target().map(str::to_string),
    }
}

async fn list_documents(State(state): State<AppState>) -> Json<DocumentsResponse> {
    let workspace = state.workspace.lock().await;
    Json(documents_response(&workspace))
}

fn decode_files(request: UploadRequest) -> Result<Vec<IncomingFile>, ApiError> {
    if request.files.is_empty() {
        return Err(bad_request_error("No files were provided"));
    }

    request
        .files
        .into_iter()
        .map(|file| {
            let bytes = STANDARD.decode(file.content_base64.trim()).map_err(|e| {
                warn!(document = %file.name, "Rejected upload with invalid base64: {}", e);
                bad_request_error(&format!("File {} is not valid base64", file.name))
            })?;
            Ok(IncomingFile {
                name: file.name,
                media_type: file.media_type,
                bytes,
            })
        })
        .collect()
}

async fn upload_documents(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<UploadResponse> {
    let files = decode_files(request)?;
    info!("Received {} file(s) for upload", files.len());

    let mut workspace = state.workspace.lock().await;
    let report = workspace.add_documents(files).map_err(flow_error)?;

    Ok(Json(UploadResponse {
        error: report.rejection_message(),
        accepted: report.accepted,
        duplicates: report.duplicates,
        rejected: report.rejected,
        documents: workspace.documents().names(),
    }))
}

async fn clear_documents(State(state): State<AppState>) -> ApiResult<DocumentsResponse> {
    let mut workspace = state.workspace.lock().await;
    workspace.clear_documents().map_err(flow_error)?;
    info!("Cleared all documents");
    Ok(Json(documents_response(&workspace)))
}

async fn remove_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<DocumentsResponse> {
    let mut workspace = state.workspace.lock().await;
    if !workspace.remove_document(&name).map_err(flow_error)? {
        return Err(not_found_error(&format!("Document {} not found", name)));
    }
    info!(document = %name, "Removed document");
    Ok(Json(documents_response(&workspace)))
}

async fn select_target(
    State(state): State<AppState>,
    Json(request): Json<SelectTargetRequest>,
) -> ApiResult<DocumentsResponse> {
    let mut workspace = state.workspace.lock().await;
    workspace.select_target(&request.name).map_err(flow_error)?;
    Ok(Json(documents_response(&workspace)))
}

async fn run_analysis(State(state): State<AppState>) -> ApiResult<Value> {
    // The workspace stays unlocked while the pipeline runs; the guard keeps
    // it from changing underneath.
    let (guard, documents, progress) = {
        let mut workspace = state.workspace.lock().await;
        let guard = workspace.begin_new_report().map_err(flow_error)?;
        (guard, workspace.documents().to_vec(), workspace.progress())
    };

    info!("Starting general analysis of {} document(s)", documents.len());
    let result = state
        .pipeline
        .analyze(&documents, &progress)
        .await
        .map_err(|e| {
            error!("General analysis failed: {}", e);
            flow_error(e)
        })?;

    let mut workspace = state.workspace.lock().await;
    workspace.store_analysis(result.clone(), state.pipeline.model(), state.chat_budget());
    drop(guard);

    Ok(Json(json!({
        "mode": "general",
        "result": result,
        "greeting": GENERAL_GREETING
    })))
}

async fn generate_guidelines(State(state): State<AppState>) -> ApiResult<Value> {
    let (guard, target, others, progress) = {
        let mut workspace = state.workspace.lock().await;
        let (target, others) = workspace.guideline_inputs().map_err(flow_error)?;
        let guard = workspace.begin_new_report().map_err(flow_error)?;
        (guard, target, others, workspace.progress())
    };

    info!(program = %target.name, benchmarks = others.len(), "Starting guideline generation");
    let result = state
        .pipeline
        .generate_guidelines(&target, &others, &progress)
        .await
        .map_err(|e| {
            error!(program = %target.name, "Guideline generation failed: {}", e);
            flow_error(e)
        })?;

    let mut workspace = state.workspace.lock().await;
    workspace.store_guidelines(result.clone(), state.pipeline.model(), state.chat_budget());
    drop(guard);

    Ok(Json(json!({
        "mode": "guidelines",
        "result": result,
        "greeting": GUIDELINE_GREETING
    })))
}

async fn download_pdf(State(state): State<AppState>) -> Result<Response, ApiError> {
    let guidelines = {
        let workspace = state.workspace.lock().await;
        workspace.guidelines().cloned()
    }
    .ok_or_else(|| not_found_error("No guideline report has been generated"))?;

    let (file_name, bytes) = render_report(&guidelines, &state.pdf_style).map_err(|e| {
        error!("PDF rendering failed: {}", e);
        flow_error(e)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn get_chat(State(state): State<AppState>) -> ApiResult<Value> {
    let chat = state
        .workspace
        .lock()
        .await
        .chat()
        .ok_or_else(|| not_found_error("No report has been generated yet"))?;

    let session = chat.lock().await;
    Ok(Json(json!({ "transcript": session.transcript() })))
}

async fn send_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    if request.message.trim().is_empty() {
        return Err(bad_request_error("Message cannot be empty"));
    }

    let chat = state
        .workspace
        .lock()
        .await
        .chat()
        .ok_or_else(|| not_found_error("No report has been generated yet"))?;

    let mut session = chat.lock().await;
    let reply = session
        .send_message(&request.message)
        .await
        .map_err(flow_error)?
        .clone();

    Ok(Json(ChatResponse {
        reply,
        transcript: session.transcript().to_vec(),
    }))
}

async fn narrate_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Response, ApiError> {
    let section = NarrationSection::parse(&section).ok_or_else(|| {
        bad_request_error("Section must be best-practices or areas-for-improvement")
    })?;

    let text = state
        .workspace
        .lock()
        .await
        .begin_narration(section)
        .ok_or_else(|| not_found_error("No general analysis report is available"))?;

    let narration = narrate(state.speech.as_ref(), &text, &state.voice).await;
    state
        .workspace
        .lock()
        .await
        .finish_narration(section, narration.status);

    match narration.clip {
        Some(clip) if narration.status == TtsStatus::Playing => {
            Ok(([(header::CONTENT_TYPE, "audio/wav")], clip.to_wav()).into_response())
        }
        _ => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Speech synthesis failed",
                "status": TtsStatus::Error
            })),
        )),
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let workspace = state.workspace.lock().await;
    Json(StatusResponse {
        busy: workspace.is_running(),
        progress: workspace.progress().current(),
        report: workspace.report().map(|report| match report {
            Report::General(_) => "general",
            Report::Guidelines(_) => "guidelines",
        }),
        narration: workspace.narration(),
    })
}
