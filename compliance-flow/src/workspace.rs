//! The single in-memory session: uploaded documents, the selected target,
//! the latest report and the chat bound to it.
//!
//! Reports and chat are derived state. Any change to the document set drops
//! them, and a new report always replaces the chat session wholesale.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::chat::ChatSession;
use crate::document::{DocumentSet, IncomingFile, IntakeReport, UploadedDocument};
use crate::error::{FlowError, Result};
use crate::llm::LanguageModel;
use crate::pipeline::ProgressSink;
use crate::report::{AnalysisResult, GENERAL_GREETING, GUIDELINE_GREETING, SpecificGuidelineResult};
use crate::speech::TtsStatus;

/// Latest progress message, readable while a run is in flight.
#[derive(Clone, Default)]
pub struct SharedProgress {
    current: Arc<Mutex<Option<String>>>,
}

impl SharedProgress {
    pub fn current(&self) -> Option<String> {
        self.current.lock().ok().and_then(|c| c.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

impl ProgressSink for SharedProgress {
    fn report(&self, message: &str) {
        info!(progress = %message, "Pipeline progress");
        if let Ok(mut current) = self.current.lock() {
            *current = Some(message.to_string());
        }
    }
}

/// Held for the length of one analysis run. Dropping it frees the workspace.
pub struct RunGuard {
    running: Arc<AtomicBool>,
    progress: SharedProgress,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.progress.clear();
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "camelCase")]
pub enum Report {
    General(AnalysisResult),
    Guidelines(SpecificGuidelineResult),
}

/// General-mode sections that can be read aloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationSection {
    BestPractices,
    AreasForImprovement,
}

impl NarrationSection {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "best-practices" | "bestPractices" => Some(Self::BestPractices),
            "areas-for-improvement" | "areasForImprovement" => Some(Self::AreasForImprovement),
            _ => None,
        }
    }

    fn text(self, result: &AnalysisResult) -> &str {
        match self {
            Self::BestPractices => &result.best_practices,
            Self::AreasForImprovement => &result.areas_for_improvement,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationState {
    pub best_practices: TtsStatus,
    pub areas_for_improvement: TtsStatus,
}

impl NarrationState {
    fn set(&mut self, section: NarrationSection, status: TtsStatus) {
        match section {
            NarrationSection::BestPractices => self.best_practices = status,
            NarrationSection::AreasForImprovement => self.areas_for_improvement = status,
        }
    }
}

#[derive(Default)]
pub struct Workspace {
    documents: DocumentSet,
    target: Option<String>,
    report: Option<Report>,
    chat: Option<Arc<AsyncMutex<ChatSession>>>,
    narration: NarrationState,
    progress: SharedProgress,
    running: Arc<AtomicBool>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match &self.report {
            Some(Report::General(result)) => Some(result),
            _ => None,
        }
    }

    pub fn guidelines(&self) -> Option<&SpecificGuidelineResult> {
        match &self.report {
            Some(Report::Guidelines(result)) => Some(result),
            _ => None,
        }
    }

    pub fn chat(&self) -> Option<Arc<AsyncMutex<ChatSession>>> {
        self.chat.clone()
    }

    pub fn narration(&self) -> NarrationState {
        self.narration
    }

    pub fn progress(&self) -> SharedProgress {
        self.progress.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_running() {
            return Err(FlowError::Busy);
        }
        Ok(())
    }

    fn invalidate(&mut self, reason: &str) {
        if self.report.is_some() || self.chat.is_some() {
            info!("{}, discarding report and chat", reason);
        }
        self.report = None;
        self.chat = None;
        self.narration = NarrationState::default();
    }

    /// Add files; only accepted files count as a change.
    pub fn add_documents(&mut self, files: Vec<IncomingFile>) -> Result<IntakeReport> {
        self.ensure_idle()?;
        let report = self.documents.intake(files);
        if report.changed() {
            self.invalidate("Document set changed");
        }
        Ok(report)
    }

    pub fn remove_document(&mut self, name: &str) -> Result<bool> {
        self.ensure_idle()?;
        if !self.documents.remove(name) {
            return Ok(false);
        }
        if self.target.as_deref() == Some(name) {
            self.target = None;
        }
        self.invalidate("Document set changed");
        Ok(true)
    }

    pub fn clear_documents(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.documents.clear();
        self.target = None;
        self.invalidate("Document set changed");
        Ok(())
    }

    pub fn select_target(&mut self, name: &str) -> Result<()> {
        self.ensure_idle()?;
        if !self.documents.contains(name) {
            return Err(FlowError::InvalidInput(format!(
                "'{}' is not one of the uploaded documents",
                name
            )));
        }
        self.target = Some(name.to_string());
        Ok(())
    }

    /// Claim the workspace for one run. A second claim, or any document
    /// change, fails with [`FlowError::Busy`] until the guard is dropped.
    pub fn try_begin_run(&self) -> Result<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                warn!("Rejected analysis request while another run is in flight");
                FlowError::Busy
            })?;
        Ok(RunGuard {
            running: self.running.clone(),
            progress: self.progress.clone(),
        })
    }

    /// Start a new analysis or guideline run. The previous report, its chat
    /// and narration are dropped up front, so a failed run leaves nothing
    /// stale behind.
    pub fn begin_new_report(&mut self) -> Result<RunGuard> {
        let guard = self.try_begin_run()?;
        self.invalidate("New report requested");
        Ok(guard)
    }

    /// The selected target and every other document, in upload order.
    pub fn guideline_inputs(&self) -> Result<(UploadedDocument, Vec<UploadedDocument>)> {
        let name = self.target.as_deref().ok_or_else(|| {
            FlowError::InvalidInput("Please select a report to generate guidelines for".to_string())
        })?;
        let target = self
            .documents
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::InvalidInput(format!("'{}' is no longer uploaded", name)))?;
        Ok((target, self.documents.others(name)))
    }

    pub fn store_analysis(
        &mut self,
        result: AnalysisResult,
        model: Arc<dyn LanguageModel>,
        context_char_budget: usize,
    ) {
        let session = ChatSession::create(model, &result.report_context(), GENERAL_GREETING, context_char_budget);
        self.chat = Some(Arc::new(AsyncMutex::new(session)));
        self.report = Some(Report::General(result));
        self.narration = NarrationState::default();
    }

    pub fn store_guidelines(
        &mut self,
        result: SpecificGuidelineResult,
        model: Arc<dyn LanguageModel>,
        context_char_budget: usize,
    ) {
        let session = ChatSession::create(model, &result.report_context(), GUIDELINE_GREETING, context_char_budget);
        self.chat = Some(Arc::new(AsyncMutex::new(session)));
        self.report = Some(Report::Guidelines(result));
        self.narration = NarrationState::default();
    }

    /// Mark `section` as loading (every other section goes idle) and return
    /// its text. `None` without a general-mode report.
    pub fn begin_narration(&mut self, section: NarrationSection) -> Option<String> {
        let text = section.text(self.analysis()?).to_string();
        self.narration = NarrationState::default();
        self.narration.set(section, TtsStatus::Loading);
        Some(text)
    }

    pub fn finish_narration(&mut self, section: NarrationSection, status: TtsStatus) {
        if self.analysis().is_some() {
            self.narration.set(section, status);
        }
    }
}
