use std::sync::Arc;
use tracing::info;

use crate::config::FlowConfig;
use crate::document::{UploadedDocument, load_all, load_text};
use crate::error::{FlowError, Result};
use crate::llm::LanguageModel;
use crate::report::{AnalysisResult, SpecificGuidelineResult};
use crate::summarize::summarize_all;
use crate::synthesis::{synthesize_general, synthesize_targeted};

pub const SYNTHESIS_STAGE_MESSAGE: &str = "Stage 2 of 2: synthesizing the final report";

pub fn summarizing_stage_message(documents: usize) -> String {
    format!("Stage 1 of 2: summarizing {} document(s)", documents)
}

/// Receives coarse progress updates, once per stage.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Logs progress and nothing else.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str) {
        info!(progress = %message, "Pipeline progress");
    }
}

/// The two-stage map-reduce run behind both analysis modes.
#[derive(Clone)]
pub struct AnalysisPipeline {
    model: Arc<dyn LanguageModel>,
    config: FlowConfig,
}

impl AnalysisPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, config: FlowConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> Arc<dyn LanguageModel> {
        self.model.clone()
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// General mode: summarize every document, then synthesize one
    /// two-section report.
    pub async fn analyze(
        &self,
        documents: &[UploadedDocument],
        progress: &dyn ProgressSink,
    ) -> Result<AnalysisResult> {
        if documents.is_empty() {
            return Err(FlowError::InvalidInput(
                "Please upload at least one document to analyze".to_string(),
            ));
        }

        let loaded = load_all(documents).await?;

        progress.report(&summarizing_stage_message(loaded.len()));
        let summaries = summarize_all(self.model.clone(), loaded, &self.config).await;

        progress.report(SYNTHESIS_STAGE_MESSAGE);
        let result = synthesize_general(self.model.as_ref(), &summaries, &self.config).await?;

        info!(
            documents = documents.len(),
            summarized = summaries.len(),
            "General analysis complete"
        );
        Ok(result)
    }

    /// Targeted mode: the target is read in full, every other document is
    /// summarized as a benchmark.
    pub async fn generate_guidelines(
        &self,
        target: &UploadedDocument,
        others: &[UploadedDocument],
        progress: &dyn ProgressSink,
    ) -> Result<SpecificGuidelineResult> {
        let target_text = load_text(target).await?;
        let loaded = load_all(others).await?;

        progress.report(&summarizing_stage_message(loaded.len()));
        let benchmarks = summarize_all(self.model.clone(), loaded, &self.config).await;

        progress.report(SYNTHESIS_STAGE_MESSAGE);
        let result = synthesize_targeted(
            self.model.as_ref(),
            &target.name,
            &target_text,
            &benchmarks,
            &self.config,
        )
        .await?;

        info!(
            program = %target.name,
            benchmarks = benchmarks.len(),
            "Guideline generation complete"
        );
        Ok(result)
    }
}
