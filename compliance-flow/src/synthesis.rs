use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{error, info};

use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::preprocess::truncate_with_marker;
use crate::report::{AnalysisResult, SpecificGuidelineResult};
use crate::summarize::{DocumentSummary, join_summaries};

pub const NO_SUPPORTING_DOCUMENTS: &str =
    "No supporting documents were provided for benchmarking.";

const SYNTHESIS_PREAMBLE: &str = "You are an expert GDC (General Dental Council) compliance analyst with extensive experience in dental practice inspections and regulatory compliance.";

fn heading_pattern(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .expect("valid heading pattern")
}

// Markdown headings are preferred; a bare line that opens with the section
// name only counts when the response has no markdown heading for it.
static BEST_PRACTICES_HEADINGS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        heading_pattern(r"^[ \t]*#{1,6}[ \t]*[^\n]*?best[ \t]+practices?[^\n]*$"),
        heading_pattern(r"^[ \t]*(?:\*\*)?[ \t]*best[ \t]+practices?\b[^\n]{0,40}$"),
    ]
});

static IMPROVEMENT_HEADINGS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        heading_pattern(r"^[ \t]*#{1,6}[ \t]*[^\n]*?areas[ \t]+for[ \t]+improvement[^\n]*$"),
        heading_pattern(r"^[ \t]*(?:\*\*)?[ \t]*areas[ \t]+for[ \t]+improvement\b[^\n]{0,40}$"),
    ]
});

fn general_prompt(summaries: &str) -> String {
    format!(
        "Below are summaries of several GDC inspection reports, separated by '--- DOCUMENT SEPARATOR ---'.

Synthesize them into ONE consolidated markdown report with exactly two sections, in this order:

## Best Practices
Practices and standards that were consistently met or done well across the reports, with specific examples.

## Areas for Improvement
Requirements that were not met, recurring weaknesses and concrete improvement actions.

Use '###' sub-headings and bullet points inside each section. Do not add any other top-level section.

REPORT SUMMARIES:
{}",
        summaries
    )
}

fn targeted_prompt(program_name: &str, target: &str, benchmarks: &str) -> String {
    format!(
        "Produce specific compliance guidelines for the program '{program}'.

Benchmark the TARGET REPORT against the SUPPORTING SUMMARIES of other inspected programs: use
them to spot practices the target should adopt and gaps that are common across programs.

Respond with ONLY a JSON object, no prose before or after it, using exactly these keys:
{{
  \"programName\": \"{program}\",
  \"executiveSummary\": \"markdown overview of the program's compliance position\",
  \"strengths\": \"markdown bullet list of what the program does well\",
  \"areasForImprovement\": \"markdown bullet list of unmet or weak requirements\",
  \"recommendations\": \"markdown numbered action plan\",
  \"complianceScore\": 0,
  \"priorityActions\": [\"short action\"],
  \"timeline\": \"markdown implementation timeline\",
  \"resourcesNeeded\": \"markdown list of required resources\"
}}
The first five keys are mandatory. complianceScore is an integer from 0 to 100.

TARGET REPORT:
{target}

SUPPORTING SUMMARIES:
{benchmarks}",
        program = program_name,
        target = target,
        benchmarks = benchmarks
    )
}

/// Start of the first heading line matched by the earliest pattern that
/// matches at all.
fn find_heading(text: &str, patterns: &[Regex]) -> Option<usize> {
    patterns
        .iter()
        .find_map(|pattern| pattern.find(text))
        .map(|found| found.start())
}

/// Split a general-mode response into its two sections.
///
/// Everything from the improvement heading line on is the second section;
/// the text before it, starting at the best-practices heading when present,
/// is the first. Without an improvement heading the whole response is the
/// first section. Prose that merely mentions a section name is not a heading.
pub fn split_general_response(response: &str) -> AnalysisResult {
    let Some(improvement_start) = find_heading(response, &*IMPROVEMENT_HEADINGS) else {
        return AnalysisResult {
            best_practices: response.trim().to_string(),
            areas_for_improvement: String::new(),
        };
    };

    let head = &response[..improvement_start];
    let best_start = find_heading(head, &*BEST_PRACTICES_HEADINGS).unwrap_or(0);

    AnalysisResult {
        best_practices: head[best_start..].trim().to_string(),
        areas_for_improvement: response[improvement_start..].trim().to_string(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuidelineResponse {
    // Required so an answer without the echo is rejected; the value is unused.
    #[serde(rename = "programName")]
    _program_name: String,
    executive_summary: String,
    strengths: String,
    areas_for_improvement: String,
    recommendations: String,
    #[serde(default)]
    compliance_score: Option<f64>,
    #[serde(default)]
    priority_actions: Option<Vec<String>>,
    #[serde(default)]
    timeline: Option<String>,
    #[serde(default)]
    resources_needed: Option<String>,
}

/// Parse a targeted-mode response. Every mandatory field must be present;
/// `programName` is always the caller's, never the model's echo.
pub fn parse_guideline_response(response: &str, program_name: &str) -> Result<SpecificGuidelineResult> {
    let json = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            return Err(FlowError::MalformedResponse(
                "no JSON object found in guideline response".to_string(),
            ));
        }
    };

    let parsed: GuidelineResponse = serde_json::from_str(json)
        .map_err(|e| FlowError::MalformedResponse(format!("guideline response: {}", e)))?;

    Ok(SpecificGuidelineResult {
        program_name: program_name.to_string(),
        executive_summary: parsed.executive_summary,
        strengths: parsed.strengths,
        areas_for_improvement: parsed.areas_for_improvement,
        recommendations: parsed.recommendations,
        compliance_score: parsed
            .compliance_score
            .map(|score| score.round().clamp(0.0, 100.0) as u8),
        priority_actions: parsed.priority_actions.unwrap_or_default(),
        timeline: parsed.timeline.filter(|t| !t.trim().is_empty()),
        resources_needed: parsed.resources_needed.filter(|r| !r.trim().is_empty()),
    })
}

/// Reduce stage, general mode.
pub async fn synthesize_general(
    model: &dyn LanguageModel,
    summaries: &[DocumentSummary],
    config: &FlowConfig,
) -> Result<AnalysisResult> {
    if summaries.is_empty() {
        return Err(FlowError::Llm("none of the documents could be summarized".to_string()));
    }

    let combined = truncate_with_marker(&join_summaries(summaries), config.prompt_char_budget);
    info!(summaries = summaries.len(), prompt_chars = combined.len(), "Synthesizing general report");

    let request = CompletionRequest::new(SYNTHESIS_PREAMBLE, general_prompt(&combined))
        .with_max_tokens(config.synthesis_max_tokens);
    let response = model.complete(request).await.map_err(|e| {
        error!("General synthesis failed: {}", e);
        e
    })?;

    let result = split_general_response(&response);
    if result.best_practices.is_empty() && result.areas_for_improvement.is_empty() {
        return Err(FlowError::MalformedResponse("empty analysis response".to_string()));
    }
    Ok(result)
}

/// Reduce stage, targeted mode. The target is sent in full (up to the prompt
/// budget); the benchmarks are summaries of every other document.
pub async fn synthesize_targeted(
    model: &dyn LanguageModel,
    program_name: &str,
    target_text: &str,
    benchmarks: &[DocumentSummary],
    config: &FlowConfig,
) -> Result<SpecificGuidelineResult> {
    let target = truncate_with_marker(target_text.trim(), config.prompt_char_budget);
    if target.is_empty() {
        return Err(FlowError::InvalidInput(format!(
            "The selected report '{}' contains no text",
            program_name
        )));
    }

    let benchmarks = if benchmarks.is_empty() {
        NO_SUPPORTING_DOCUMENTS.to_string()
    } else {
        truncate_with_marker(&join_summaries(benchmarks), config.prompt_char_budget)
    };

    info!(
        program = %program_name,
        target_chars = target.len(),
        benchmark_chars = benchmarks.len(),
        "Synthesizing specific guidelines"
    );

    let request = CompletionRequest::new(
        SYNTHESIS_PREAMBLE,
        targeted_prompt(program_name, &target, &benchmarks),
    )
    .with_max_tokens(config.synthesis_max_tokens);
    let response = model.complete(request).await?;

    parse_guideline_response(&response, program_name).map_err(|e| {
        error!(program = %program_name, "Guideline response rejected: {}", e);
        e
    })
}
