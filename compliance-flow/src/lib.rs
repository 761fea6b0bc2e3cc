//! # compliance-flow
//!
//! Map-reduce analysis of dental inspection reports with a hosted language
//! model.
//!
//! Each uploaded document is summarized on its own (the map stage, run in
//! rate-limited batches) and the summaries are synthesized into one report
//! (the reduce stage). Two report shapes exist:
//!
//! - **General**: best practices and areas for improvement across every
//!   document ([`AnalysisPipeline::analyze`]).
//! - **Targeted**: one selected program benchmarked against summaries of all
//!   the others ([`AnalysisPipeline::generate_guidelines`]).
//!
//! A finished report seeds a [`ChatSession`], can be read aloud through a
//! [`SpeechSynthesizer`] and, in targeted mode, exported as a PDF.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use compliance_flow::{
//!     AnalysisPipeline, FlowConfig, IncomingFile, OpenRouterModel, TracingProgress, Workspace,
//! };
//!
//! # async fn example() -> compliance_flow::Result<()> {
//! let model = Arc::new(OpenRouterModel::new("api-key", "google/gemini-2.5-flash"));
//! let pipeline = AnalysisPipeline::new(model.clone(), FlowConfig::default());
//!
//! let mut workspace = Workspace::new();
//! workspace.add_documents(vec![IncomingFile {
//!     name: "practice-a.txt".to_string(),
//!     media_type: Some("text/plain".to_string()),
//!     bytes: b"Infection control fully met.".to_vec(),
//! }])?;
//!
//! let documents = workspace.documents().to_vec();
//! let result = pipeline.analyze(&documents, &TracingProgress).await?;
//! workspace.store_analysis(result, model, FlowConfig::default().chat_context_char_budget);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod pdf;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod speech;
pub mod summarize;
pub mod synthesis;
pub mod workspace;

pub use batch::BatchRunner;
pub use chat::{CHAT_APOLOGY, ChatMessage, ChatRole, ChatSession};
pub use config::FlowConfig;
pub use document::{DocumentSet, IncomingFile, IntakeReport, MediaKind, UploadedDocument};
pub use error::{FlowError, Result};
pub use llm::{LanguageModel, MockLanguageModel, OpenRouterModel};
pub use pdf::{PdfStyle, render_report};
pub use pipeline::{AnalysisPipeline, ProgressSink, TracingProgress};
pub use report::{AnalysisResult, SpecificGuidelineResult};
pub use speech::{
    AudioClip, GeminiSpeech, Narration, SpeechSynthesizer, TtsStatus, VoiceConfig, narrate,
};
pub use workspace::{NarrationSection, Report, RunGuard, SharedProgress, Workspace};
