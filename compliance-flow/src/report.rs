use serde::{Deserialize, Serialize};

pub const GENERAL_GREETING: &str =
    "Hello! I am your AI Compliance Assistant. Feel free to ask me any questions about the report above.";
pub const GUIDELINE_GREETING: &str =
    "Hello! I am your AI Compliance Assistant. Ask me anything about the specific guidelines report above.";

/// General-mode report covering every uploaded document equally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub best_practices: String,
    pub areas_for_improvement: String,
}

impl AnalysisResult {
    pub fn report_context(&self) -> String {
        format!(
            "## Best Practice Recommendations\n{}\n\n## Common Areas for Improvement\n{}",
            self.best_practices, self.areas_for_improvement
        )
    }
}

/// Targeted-mode report benchmarking one program against the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificGuidelineResult {
    pub program_name: String,
    pub executive_summary: String,
    pub strengths: String,
    pub areas_for_improvement: String,
    pub recommendations: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_needed: Option<String>,
}

impl SpecificGuidelineResult {
    pub fn report_context(&self) -> String {
        format!(
            "## Program Name\n{}\n\n## Executive Summary\n{}\n\n## Strengths\n{}\n\n## Areas for Improvement\n{}\n\n## Recommendations\n{}",
            self.program_name,
            self.executive_summary,
            self.strengths,
            self.areas_for_improvement,
            self.recommendations
        )
    }

    /// The four report sections in reading order, with their display titles.
    pub fn sections(&self) -> [(&'static str, &str); 4] {
        [
            ("Executive Summary", self.executive_summary.as_str()),
            ("Identified Strengths", self.strengths.as_str()),
            ("Areas for Improvement", self.areas_for_improvement.as_str()),
            ("Actionable Recommendations", self.recommendations.as_str()),
        ]
    }
}
