use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::BatchRunner;
use crate::config::FlowConfig;
use crate::document::LoadedDocument;
use crate::error::FlowError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::preprocess::preprocess;

pub const DOCUMENT_SEPARATOR: &str = "\n\n--- DOCUMENT SEPARATOR ---\n\n";

const SUMMARY_PREAMBLE: &str =
    "You are a GDC (General Dental Council) compliance analyst who condenses inspection reports.";

/// A condensed view of one document, produced by the map stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub source: String,
    pub text: String,
}

fn summary_prompt(content: &str) -> String {
    format!(
        "Summarize the following inspection report in concise markdown.

Focus on what the inspectors explicitly recorded:
- Requirements that were MET, with the standard or area they relate to
- Requirements that were NOT MET or only partially met
- Notable strengths and weaknesses
- The overall conclusion of the inspection

Use short bullet points under the headings '## Strengths', '## Weaknesses' and '## Conclusion'.
Do not invent findings that are not in the report.

INSPECTION REPORT:
{}",
        content
    )
}

/// Summarize one document. Any failure yields an empty string; callers drop
/// empties before the reduce stage.
pub async fn summarize_document(
    model: &dyn LanguageModel,
    name: &str,
    content: &str,
    config: &FlowConfig,
) -> String {
    let prepared = preprocess(content, config);
    if prepared.is_empty() {
        warn!(document = %name, "Document has no text to summarize");
        return String::new();
    }

    let request = CompletionRequest::new(SUMMARY_PREAMBLE, summary_prompt(&prepared))
        .with_max_tokens(config.summary_max_tokens);

    match model.complete(request).await {
        Ok(summary) => {
            info!(document = %name, summary_chars = summary.len(), "Summarized document");
            summary.trim().to_string()
        }
        Err(e) => {
            warn!(document = %name, "Summarization failed, document omitted: {}", e);
            String::new()
        }
    }
}

/// Map stage: summarize every document through the batch runner, keeping
/// original order and dropping failures.
pub async fn summarize_all(
    model: Arc<dyn LanguageModel>,
    documents: Vec<LoadedDocument>,
    config: &FlowConfig,
) -> Vec<DocumentSummary> {
    let total = documents.len();
    let runner = BatchRunner::new(config.batch_size, config.batch_delay);

    let summaries = runner
        .run(documents, |doc| {
            let model = model.clone();
            async move {
                let text = summarize_document(model.as_ref(), &doc.name, &doc.text, config).await;
                if text.is_empty() {
                    Err(FlowError::Llm(format!("no summary for {}", doc.name)))
                } else {
                    Ok(DocumentSummary {
                        source: doc.name,
                        text,
                    })
                }
            }
        })
        .await;

    info!(
        summarized = summaries.len(),
        omitted = total - summaries.len(),
        "Map stage complete"
    );
    summaries
}

pub fn join_summaries(summaries: &[DocumentSummary]) -> String {
    summaries
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
