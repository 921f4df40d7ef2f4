//! Tolerant parsing of model-produced gap analyses
//!
//! The model is asked for a bare JSON object but regularly wraps it in
//! markdown fences or surrounds it with prose. Anything that still fails to
//! validate becomes a degraded report instead of an error.

use papermind_common::errors::AppError;
use papermind_common::models::{AnalysisReport, MethodologySuggestion};
use serde::Deserialize;
use tracing::warn;

/// Outcome of parsing an analysis response
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAnalysis {
    Complete(AnalysisReport),
    /// The response did not validate; the report carries error strings
    Degraded { report: AnalysisReport, reason: String },
}

/// Wire shape the model must produce. The two core lists are mandatory.
#[derive(Deserialize)]
struct StrictReport {
    #[serde(default)]
    common_approaches: Vec<String>,
    #[serde(default)]
    missing_evaluations: Vec<String>,
    #[serde(default)]
    unexplored_scenarios: Vec<String>,
    research_gaps: Vec<String>,
    methodology_suggestions: Vec<MethodologySuggestion>,
}

impl From<StrictReport> for AnalysisReport {
    fn from(raw: StrictReport) -> Self {
        Self {
            common_approaches: raw.common_approaches,
            missing_evaluations: raw.missing_evaluations,
            unexplored_scenarios: raw.unexplored_scenarios,
            research_gaps: raw.research_gaps,
            methodology_suggestions: raw.methodology_suggestions,
        }
    }
}

impl ParsedAnalysis {
    pub fn parse(raw: &str) -> Self {
        match parse_report(raw) {
            Ok(report) => Self::Complete(report),
            Err(e) => {
                warn!(error = %e, "Analysis response did not validate, returning degraded report");
                Self::Degraded {
                    report: degraded_report(),
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn into_report(self) -> AnalysisReport {
        match self {
            Self::Complete(report) | Self::Degraded { report, .. } => report,
        }
    }
}

fn parse_report(raw: &str) -> Result<AnalysisReport, AppError> {
    let body = json_body(raw).ok_or_else(|| AppError::GenerationParse {
        message: "no JSON object in response".to_string(),
    })?;

    serde_json::from_str::<StrictReport>(body)
        .map(AnalysisReport::from)
        .map_err(|e| AppError::GenerationParse {
            message: e.to_string(),
        })
}

/// Strip code fences, then take the outermost `{ .. }` span
fn json_body(raw: &str) -> Option<&str> {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.trim();
    let text = text.strip_suffix("```").unwrap_or(text);

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Placeholder report stored when the model's answer is unusable
pub fn degraded_report() -> AnalysisReport {
    AnalysisReport {
        common_approaches: vec!["Error identifying common approaches.".to_string()],
        missing_evaluations: vec!["Error identifying missing evaluations.".to_string()],
        unexplored_scenarios: vec!["Error identifying unexplored scenarios.".to_string()],
        research_gaps: vec!["Error generating gaps.".to_string()],
        methodology_suggestions: vec![MethodologySuggestion {
            action: "Error generating suggestions.".to_string(),
            reasoning: "The analysis model returned output that could not be parsed. Run the analysis again.".to_string(),
            citations: Vec::new(),
        }],
    }
}
