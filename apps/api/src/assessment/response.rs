//! Response handling for structured model output.
//!
//! Model text may arrive wrapped in explanatory tags, prose or code fences.
//! Everything here either yields a fully validated value or an
//! `AnalysisError::Validation`; nothing is guessed. The one deliberate
//! leniency is enumerated report fields, which fall back per field.

use serde_json::{Map, Value};
use tracing::warn;

use crate::assessment::requester::AnalysisError;
use crate::models::analysis::ProjectAnalysisResult;
use crate::models::report::{
    Authenticity, ClosedSet, Recommendation, ReportContent, ScoreBand, SeniorityLevel,
};

/// Max entries kept in any list field.
pub const MAX_LIST_ITEMS: usize = 5;

/// Tag blocks whose whole content is commentary and must be dropped.
const EXPLANATORY_TAGS: &[&str] = &["thinking", "reasoning", "explanation", "scratchpad"];

// ────────────────────────────────────────────────────────────────────────────
// Stripping
// ────────────────────────────────────────────────────────────────────────────

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Removes every `<tag ...>...</tag>` block. An unclosed block is left as is.
fn remove_tag_blocks(text: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        match rest[start..].find(&close) {
            Some(end_rel) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + end_rel + close.len()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Returns the JSON object embedded in raw model text, if any.
pub fn extract_json_object(text: &str) -> Option<String> {
    let mut cleaned = text.to_string();
    for tag in EXPLANATORY_TAGS {
        cleaned = remove_tag_blocks(&cleaned, tag);
    }
    let cleaned = strip_json_fences(&cleaned);

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    (end > start).then(|| cleaned[start..=end].to_string())
}

/// Strips wrappers and parses the payload as a JSON object.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, AnalysisError> {
    let payload = extract_json_object(text)
        .ok_or_else(|| AnalysisError::Validation("response contains no JSON object".into()))?;
    match serde_json::from_str::<Value>(&payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AnalysisError::Validation(
            "response JSON is not an object".into(),
        )),
        Err(e) => Err(AnalysisError::Validation(format!(
            "response is not valid JSON: {e}"
        ))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field validation
// ────────────────────────────────────────────────────────────────────────────

/// A required numeric score, rounded and clamped into 0–100.
fn required_score(obj: &Map<String, Value>, field: &str) -> Result<i32, AnalysisError> {
    let value = obj
        .get(field)
        .ok_or_else(|| AnalysisError::Validation(format!("missing required field '{field}'")))?;
    let number = value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| AnalysisError::Validation(format!("'{field}' is not a number: {value}")))?;
    Ok(number.round().clamp(0.0, 100.0) as i32)
}

/// A required list of strings, blank items dropped, truncated to `MAX_LIST_ITEMS`.
fn required_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, AnalysisError> {
    let items = obj
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| AnalysisError::Validation(format!("'{field}' must be a list")))?;

    let mut out = Vec::with_capacity(items.len().min(MAX_LIST_ITEMS));
    for item in items {
        let text = item.as_str().ok_or_else(|| {
            AnalysisError::Validation(format!("'{field}' must contain only strings"))
        })?;
        let text = text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
    }
    out.truncate(MAX_LIST_ITEMS);
    Ok(out)
}

fn optional_text(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Maps an enumerated field onto its closed set, substituting the documented
/// fallback for this field only when the value is missing or unknown.
pub fn normalize<T: ClosedSet>(obj: &Map<String, Value>, field: &str) -> T {
    let raw = obj.get(field);
    match raw.and_then(Value::as_str).and_then(T::parse) {
        Some(value) => value,
        None => {
            warn!(
                "Report field '{}' had unrecognized value {:?}; using {}",
                T::FIELD,
                raw,
                T::FALLBACK.as_str()
            );
            T::FALLBACK
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typed results
// ────────────────────────────────────────────────────────────────────────────

pub fn parse_project_result(text: &str) -> Result<ProjectAnalysisResult, AnalysisError> {
    let obj = parse_object(text)?;
    Ok(ProjectAnalysisResult {
        score: required_score(&obj, "score")?,
        summary: optional_text(&obj, "summary"),
        strengths: required_list(&obj, "strengths")?,
        improvements: required_list(&obj, "improvements")?,
        technologies: required_list(&obj, "technologies")?,
    })
}

pub fn parse_report_content(text: &str) -> Result<ReportContent, AnalysisError> {
    let obj = parse_object(text)?;
    Ok(ReportContent {
        overall_score: required_score(&obj, "overall_score")?,
        recommendation: normalize::<Recommendation>(&obj, "recommendation"),
        level: normalize::<SeniorityLevel>(&obj, "level"),
        score_band: normalize::<ScoreBand>(&obj, "score_band"),
        authenticity: normalize::<Authenticity>(&obj, "authenticity"),
        summary: optional_text(&obj, "summary"),
        strengths: required_list(&obj, "strengths")?,
        concerns: required_list(&obj, "concerns")?,
        interview_focus: required_list(&obj, "interview_focus")?,
    })
}
