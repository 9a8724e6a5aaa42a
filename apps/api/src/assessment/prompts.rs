// All LLM prompt constants for the assessment pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Output budget for one project analysis.
pub const PROJECT_RESPONSE_BUDGET: u32 = 2048;
pub const PROJECT_TEMPERATURE: f32 = 0.2;

/// Output budget for the candidate-level report.
pub const REPORT_RESPONSE_BUDGET: u32 = 4096;
pub const REPORT_TEMPERATURE: f32 = 0.3;

/// System prompt for per-project analysis. Enforces JSON-only output.
pub const PROJECT_ANALYSIS_SYSTEM: &str = "\
You are a senior software engineer reviewing a candidate's repository for a hiring team. \
Judge code quality, structure, testing and engineering judgement from the files given. \
You MUST respond with valid JSON only. \
Do NOT include any text outside the JSON object. \
Do NOT use markdown code fences.";

/// Per-project prompt. Replace `{project_name}`, `{source_ref}`,
/// `{evidence_instruction}` and `{files}` before sending.
pub const PROJECT_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Review the repository "{project_name}" ({source_ref}).

{evidence_instruction}

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 0-100 integer,
  "summary": "two or three sentences on overall quality",
  "strengths": ["at most 5 short items"],
  "improvements": ["at most 5 short items"],
  "technologies": ["at most 5 languages/frameworks actually used"]
}

Scoring guide: 90+ production-grade, 70-89 solid professional work,
50-69 workable with clear gaps, below 50 significant problems.

FILES (highest priority first, some truncated):
{files}"#;

/// System prompt for the consolidated candidate report.
pub const AGGREGATE_REPORT_SYSTEM: &str = "\
You are a hiring committee lead consolidating several code reviews of one candidate \
into a single recommendation. Be calibrated and concrete. \
You MUST respond with valid JSON only. \
Do NOT include any text outside the JSON object. \
Do NOT use markdown code fences.";

/// Aggregate prompt. Replace `{candidate_name}`, `{experience}`,
/// `{evidence_instruction}` and `{analyses_json}` before sending.
pub const AGGREGATE_REPORT_PROMPT_TEMPLATE: &str = r#"Consolidate the project analyses below into one assessment of {candidate_name}.

SELF-REPORTED EXPERIENCE:
{experience}

{evidence_instruction}

Return a JSON object with this EXACT schema (no extra fields):
{
  "overall_score": 0-100 integer,
  "recommendation": "STRONG_HIRE" | "HIRE" | "MAYBE" | "NO_HIRE",
  "level": "JUNIOR" | "MID" | "SENIOR" | "STAFF",
  "score_band": "EXCEPTIONAL" | "STRONG" | "AVERAGE" | "BELOW_AVERAGE" | "WEAK",
  "authenticity": "AUTHENTIC" | "UNCERTAIN" | "SUSPICIOUS",
  "summary": "one paragraph for a recruiter",
  "strengths": ["at most 5 items"],
  "concerns": ["at most 5 items"],
  "interview_focus": ["at most 5 topics to probe in interview"]
}

Compare the self-reported experience with what the code shows. If they disagree
sharply, reflect it in "authenticity" and "concerns".

PROJECT ANALYSES:
{analyses_json}"#;

/// Fills `{key}` placeholders in one pass. Substituted values are never
/// rescanned, so user text containing a placeholder stays literal.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = values.iter().find_map(|&(key, value)| {
            let placeholder_len = key.len() + 2;
            (tail.len() >= placeholder_len
                && tail[1..].starts_with(key)
                && tail[1 + key.len()..].starts_with('}'))
            .then_some((placeholder_len, value))
        });
        match hit {
            Some((len, value)) => {
                out.push_str(value);
                rest = &tail[len..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
