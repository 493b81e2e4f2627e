use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// The five sections of the unified diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Comprehensive,
    ResponseTime,
    Tps,
    ErrorRate,
    ResourceUsage,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 5] = [
        AnalysisType::Comprehensive,
        AnalysisType::ResponseTime,
        AnalysisType::Tps,
        AnalysisType::ErrorRate,
        AnalysisType::ResourceUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Comprehensive => "comprehensive",
            AnalysisType::ResponseTime => "response_time",
            AnalysisType::Tps => "tps",
            AnalysisType::ErrorRate => "error_rate",
            AnalysisType::ResourceUsage => "resource_usage",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInsight {
    pub category: String,
    pub message: String,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// One parsed analysis section, persisted as the JSON result column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleAnalysis {
    pub analysis_type: AnalysisType,
    pub summary: String,
    pub detailed_analysis: String,
    pub insights: Vec<AnalysisInsight>,
    pub performance_score: Option<f64>,
}

/// Parses the LLM's unified JSON envelope into the five analysis sections.
///
/// Returns `None` only when no JSON object can be extracted at all; a
/// missing or malformed section degrades to a fallback entry for that
/// section while the rest parse normally.
pub fn parse_unified_response(raw: &str) -> Option<Vec<SingleAnalysis>> {
    let envelope = extract_json(raw)?;

    let mut analyses = Vec::with_capacity(AnalysisType::ALL.len());
    for analysis_type in AnalysisType::ALL {
        match envelope.get(analysis_type.as_str()) {
            Some(section) => analyses.push(parse_section(section, analysis_type)),
            None => {
                warn!("LLM response is missing the {} section", analysis_type.as_str());
                analyses.push(fallback_analysis(analysis_type));
            }
        }
    }
    Some(analyses)
}

/// The response may wrap its JSON in a fenced code block or surround it with
/// prose; try the fence first, then the outermost braces.
fn extract_json(raw: &str) -> Option<Value> {
    let fenced = Regex::new(r"(?s)```json\s*\n(.*?)\n```").unwrap();
    if let Some(captures) = fenced.captures(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(captures[1].trim()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()
        .filter(Value::is_object)
}

fn parse_section(section: &Value, analysis_type: AnalysisType) -> SingleAnalysis {
    let summary = section
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("No summary provided.")
        .to_string();
    let detailed_analysis = section
        .get("detailed_analysis")
        .and_then(Value::as_str)
        .unwrap_or("No detailed analysis provided.")
        .to_string();

    let insights = section
        .get("insights")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let item = item.as_object()?;
                    Some(AnalysisInsight {
                        category: item
                            .get("category")
                            .and_then(Value::as_str)
                            .unwrap_or("performance")
                            .to_string(),
                        message: item
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("No insight message.")
                            .to_string(),
                        severity: item
                            .get("severity")
                            .and_then(Value::as_str)
                            .unwrap_or("info")
                            .to_string(),
                        recommendation: item
                            .get("recommendation")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let performance_score = section
        .get("performance_score")
        .and_then(Value::as_f64)
        .filter(|score| {
            let in_range = (0.0..=100.0).contains(score);
            if !in_range {
                warn!("Performance score {score} out of range, dropping");
            }
            in_range
        });

    SingleAnalysis {
        analysis_type,
        summary,
        detailed_analysis,
        insights,
        performance_score,
    }
}

pub fn fallback_analysis(analysis_type: AnalysisType) -> SingleAnalysis {
    SingleAnalysis {
        analysis_type,
        summary: format!("The {} analysis could not be produced.", analysis_type.as_str()),
        detailed_analysis: format!(
            "The model response could not be parsed, so no {} analysis is available for this run.",
            analysis_type.as_str()
        ),
        insights: vec![AnalysisInsight {
            category: "system".to_string(),
            message: "This section was skipped because the analysis response failed to parse."
                .to_string(),
            severity: "warning".to_string(),
            recommendation: None,
        }],
        performance_score: None,
    }
}

pub fn fallback_analyses() -> Vec<SingleAnalysis> {
    AnalysisType::ALL.into_iter().map(fallback_analysis).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_envelope() -> String {
        serde_json::json!({
            "comprehensive": {
                "summary": "Overall healthy",
                "detailed_analysis": "The run stayed stable.",
                "insights": [
                    {"category": "performance", "message": "TPS steady",
                     "severity": "info", "recommendation": "none needed"}
                ],
                "performance_score": 88
            },
            "response_time": {"summary": "Fast", "detailed_analysis": "p95 low",
                              "insights": [], "performance_score": 91},
            "tps": {"summary": "Stable", "detailed_analysis": "flat",
                    "insights": [], "performance_score": 85},
            "error_rate": {"summary": "Low", "detailed_analysis": "0.5%",
                           "insights": [], "performance_score": 95},
            "resource_usage": {"summary": "Moderate", "detailed_analysis": "CPU 40%",
                               "insights": [], "performance_score": 80}
        })
        .to_string()
    }

    #[test]
    fn parses_plain_json_envelope() {
        let analyses = parse_unified_response(&valid_envelope()).unwrap();
        assert_eq!(analyses.len(), 5);
        assert_eq!(analyses[0].analysis_type, AnalysisType::Comprehensive);
        assert_eq!(analyses[0].performance_score, Some(88.0));
        assert_eq!(analyses[0].insights.len(), 1);
    }

    #[test]
    fn parses_fenced_json_envelope() {
        let raw = format!("Here is the analysis:\n```json\n{}\n```\nDone.", valid_envelope());
        let analyses = parse_unified_response(&raw).unwrap();
        assert_eq!(analyses.len(), 5);
        assert_eq!(analyses[3].analysis_type, AnalysisType::ErrorRate);
    }

    #[test]
    fn missing_section_degrades_to_fallback() {
        let raw = r#"{"comprehensive": {"summary": "ok", "detailed_analysis": "fine"}}"#;
        let analyses = parse_unified_response(raw).unwrap();
        assert_eq!(analyses.len(), 5);
        assert_eq!(analyses[0].summary, "ok");
        assert!(analyses[1].summary.contains("could not be produced"));
    }

    #[test]
    fn out_of_range_score_is_dropped() {
        let raw = r#"{"comprehensive": {"summary": "ok", "detailed_analysis": "x",
                       "performance_score": 250}}"#;
        let analyses = parse_unified_response(raw).unwrap();
        assert_eq!(analyses[0].performance_score, None);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_unified_response("no json here at all").is_none());
        assert!(parse_unified_response("").is_none());
    }

    #[test]
    fn fallback_set_covers_all_types() {
        let fallbacks = fallback_analyses();
        assert_eq!(fallbacks.len(), 5);
        assert!(fallbacks.iter().all(|a| a.performance_score.is_none()));
    }
}
