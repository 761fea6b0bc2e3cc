use compliance_flow::ChatMessage;
use compliance_flow::workspace::NarrationState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    pub name: String,
    pub media_type: Option<String>,
    pub content_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadRequest {
    pub files: Vec<UploadFile>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub accepted: Vec<String>,
    pub duplicates: Vec<String>,
    pub rejected: Vec<String>,
    /// User-facing message naming every rejected file
    pub error: Option<String>,
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsResponse {
    pub documents: Vec<String>,
    pub target: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectTargetRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: ChatMessage,
    pub transcript: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub busy: bool,
    pub progress: Option<String>,
    /// `general`, `guidelines`, or absent before any report
    pub report: Option<&'static str>,
    pub narration: NarrationState,
}
