//! Candidate-level aggregate report and its closed value sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A field whose values come from a fixed set, with one documented fallback
/// used when the model returns something outside it.
pub trait ClosedSet: Sized + Copy {
    const FIELD: &'static str;
    const FALLBACK: Self;

    fn parse(raw: &str) -> Option<Self>;
    fn as_str(&self) -> &'static str;
}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal, fallback = $fallback:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl ClosedSet for $name {
            const FIELD: &'static str = $field;
            const FALLBACK: Self = $name::$fallback;

            fn parse(raw: &str) -> Option<Self> {
                let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
                match normalized.as_str() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }
    };
}

closed_set!(
    /// Hiring recommendation. Falls back to the neutral `MAYBE`.
    Recommendation, field = "recommendation", fallback = Maybe,
    {
        StrongHire => "STRONG_HIRE",
        Hire => "HIRE",
        Maybe => "MAYBE",
        NoHire => "NO_HIRE",
    }
);

closed_set!(
    /// Estimated seniority. Falls back to `MID`.
    SeniorityLevel, field = "level", fallback = Mid,
    {
        Junior => "JUNIOR",
        Mid => "MID",
        Senior => "SENIOR",
        Staff => "STAFF",
    }
);

closed_set!(
    /// Coarse score band. Falls back to `AVERAGE`.
    ScoreBand, field = "score_band", fallback = Average,
    {
        Exceptional => "EXCEPTIONAL",
        Strong => "STRONG",
        Average => "AVERAGE",
        BelowAverage => "BELOW_AVERAGE",
        Weak => "WEAK",
    }
);

closed_set!(
    /// Whether the submitted work looks like the candidate's own. Falls back to `UNCERTAIN`.
    Authenticity, field = "authenticity", fallback = Uncertain,
    {
        Authentic => "AUTHENTIC",
        Uncertain => "UNCERTAIN",
        Suspicious => "SUSPICIOUS",
    }
);

/// Normalized report content as produced by the aggregate generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContent {
    pub overall_score: i32,
    pub recommendation: Recommendation,
    pub level: SeniorityLevel,
    pub score_band: ScoreBand,
    pub authenticity: Authenticity,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub interview_focus: Vec<String>,
}

/// The single report row per candidate. Overwritten on every regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub id: Uuid,
    pub candidate_id: Uuid,
    #[serde(flatten)]
    pub content: ReportContent,
    pub project_count: i32,
    pub generated_at: DateTime<Utc>,
}
