// Cross-cutting prompt fragments.
// Stage templates live in assessment/prompts.rs.

/// Appended to every assessment prompt.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Base every judgement on the code and analyses provided. \
    Do NOT reward claims that the code does not support. \
    If the evidence is thin, say so in the relevant list instead of guessing.";
