//! Diagnosis records and the pure transformations around them.
//!
//! Raw model text flows through [`extract`] (find the JSON object), then
//! [`normalize`] (validate and coerce into a [`DiagnosisResult`]). Later
//! verification evidence is folded in with [`merge`].

pub mod error;
pub mod extract;
pub mod normalize;
pub mod verify;

pub use error::{DiagnosisFailure, ExtractError, FieldError, ValidationErrors};
pub use extract::extract;
pub use normalize::normalize;
pub use verify::{merge, Judgment};

use serde::{Deserialize, Serialize};

/// How sure the analysis is about its diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    /// Strict mapping used for the top-level `confidence` field.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

/// Verification state of a diagnosis. Absent means pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    #[default]
    Pending,
    Resolved,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Pending => "pending",
            FixStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetLanguage {
    Cpp,
    C,
    Python,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixStep {
    pub step: i64,
    pub action: String,
    pub why: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub language: SnippetLanguage,
    pub content: String,
}

/// A part of the diagnosis the analysis could not pin down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncertaintyZone {
    pub area: String,
    pub reason: String,
    pub how_to_verify: String,
}

/// Where the observed behavior differs from what the user intended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMismatch {
    pub expected: String,
    pub observed: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRisk {
    pub risk: String,
    pub likelihood: Confidence,
    pub prevention: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_horizon: Option<String>,
}

/// Canonical structured output of an analysis request.
///
/// Only [`normalize`] and [`merge`] produce values of this type, so the
/// confidence and status invariants hold for every instance in circulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub title: String,
    pub confidence: Confidence,
    pub summary: String,
    pub likely_causes: Vec<String>,
    pub fix_steps: Vec<FixStep>,
    pub verification: Vec<String>,
    pub explanation_beginner: String,
    pub explanation_advanced: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_beginner_sankofa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<CodeSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_notes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty_zones: Option<Vec<UncertaintyZone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_mismatch: Option<Vec<IntentMismatch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_risks: Option<Vec<FailureRisk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FixStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_this_fix_worked: Option<String>,
}

impl DiagnosisResult {
    /// Effective status; a missing `status` field means pending.
    pub fn fix_status(&self) -> FixStatus {
        self.status.unwrap_or_default()
    }

    pub fn is_resolved(&self) -> bool {
        self.fix_status() == FixStatus::Resolved
    }

    pub fn has_uncertainty(&self) -> bool {
        self.uncertainty_zones
            .as_ref()
            .is_some_and(|zones| !zones.is_empty())
    }
}

/// Run raw model text through extraction, decoding and normalization.
pub fn parse_diagnosis(raw: &str) -> Result<DiagnosisResult, DiagnosisFailure> {
    let json = extract(raw)?;
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(normalize(&value)?)
}
