use super::{Confidence, DiagnosisResult, FixStatus};

/// Verdict on whether new evidence shows the fix worked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub status: FixStatus,
    pub rationale: Option<String>,
}

impl Judgment {
    pub fn resolved(rationale: impl Into<String>) -> Self {
        Self {
            status: FixStatus::Resolved,
            rationale: Some(rationale.into()),
        }
    }

    pub fn pending() -> Self {
        Self {
            status: FixStatus::Pending,
            rationale: None,
        }
    }
}

/// Fold a verification judgment into a prior diagnosis.
///
/// The prior is left untouched; the returned result replaces it. Resolution
/// is evidence-backed, so it forces high confidence even when the original
/// analysis listed uncertainty zones. A pending verdict never carries an
/// explanation of why the fix worked.
pub fn merge(prior: &DiagnosisResult, judgment: &Judgment) -> DiagnosisResult {
    let mut next = prior.clone();
    next.status = Some(judgment.status);

    match judgment.status {
        FixStatus::Resolved => {
            next.confidence = Confidence::High;
            next.why_this_fix_worked = judgment
                .rationale
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
        }
        FixStatus::Pending => {
            next.why_this_fix_worked = None;
        }
    }

    next
}
