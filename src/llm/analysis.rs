use super::client::{invoke_with_fallback, EvidenceImage, ModelClient, ModelRequest};
use super::models::ModelCache;
use super::prompts;
use crate::config::Config;
use crate::diagnosis::{
    extract, merge, parse_diagnosis, DiagnosisFailure, DiagnosisResult, FieldError, FixStatus,
    Judgment,
};
use crate::util::truncate_str;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Problem report from the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnoseRequest {
    pub description: String,
    pub code: Option<String>,
    pub image: Option<EvidenceImage>,
}

/// New evidence submitted after the user tried the suggested fix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationEvidence {
    pub notes: String,
    /// Checks from the prior result's `verification` list the user confirmed
    pub confirmations: Vec<String>,
    pub image: Option<EvidenceImage>,
}

/// Ask the model for a diagnosis and normalize its answer.
///
/// A response that cannot be extracted, decoded or validated is sent back to
/// the model with the problem described, up to `config.max_parse_attempts`
/// attempts in total. On exhaustion the last [`DiagnosisFailure`] is returned
/// inside the error so callers can downcast it.
pub async fn analyze<C>(
    client: &C,
    cache: &ModelCache,
    config: &Config,
    request: &DiagnoseRequest,
) -> anyhow::Result<DiagnosisResult>
where
    C: ModelClient + ?Sized,
{
    let base = ModelRequest {
        system: prompts::diagnosis_system(),
        user: prompts::diagnosis_user(
            &request.description,
            request.code.as_deref(),
            request.image.is_some(),
        ),
        image: request.image.clone(),
    };

    with_correction_retries(client, cache, config, &base, "diagnosis", parse_diagnosis).await
}

/// Interpret the verification model's reply.
///
/// Status words other than a clear resolution are read as pending, so a
/// vague reply never marks a fix as verified.
pub fn parse_judgment(raw: &str) -> Result<Judgment, DiagnosisFailure> {
    let json = extract(raw)?;
    let value: Value = serde_json::from_str(json)?;
    let Some(obj) = value.as_object() else {
        return Err(DiagnosisFailure::Validation(FieldError::NotAnObject.into()));
    };

    let raw_status = obj.get("status").and_then(Value::as_str).unwrap_or("");
    let status = match raw_status.trim().to_ascii_lowercase().as_str() {
        "resolved" | "fixed" | "verified" | "confirmed" => FixStatus::Resolved,
        "pending" => FixStatus::Pending,
        other => {
            warn!(status = %other, "unrecognized judgment status; treating as pending");
            FixStatus::Pending
        }
    };

    let rationale = obj
        .get("rationale")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(Judgment { status, rationale })
}

/// Keep only confirmations that name a check from the prior result.
fn known_confirmations(prior: &DiagnosisResult, confirmations: &[String]) -> Vec<String> {
    let mut kept = Vec::new();
    for label in confirmations {
        let label = label.trim();
        if prior.verification.iter().any(|check| check == label) {
            if !kept.iter().any(|k: &String| k == label) {
                kept.push(label.to_string());
            }
        } else {
            warn!(label = %label, "ignoring confirmation that is not in the verification list");
        }
    }
    kept
}

/// Judge new evidence against a prior diagnosis and merge the verdict.
///
/// A result that is already resolved is returned as-is without calling the
/// model; its checklist is final.
pub async fn verify_fix<C>(
    client: &C,
    cache: &ModelCache,
    config: &Config,
    prior: &DiagnosisResult,
    evidence: &VerificationEvidence,
) -> anyhow::Result<DiagnosisResult>
where
    C: ModelClient + ?Sized,
{
    if prior.is_resolved() {
        info!(title = %prior.title, "diagnosis already resolved; skipping verification");
        return Ok(prior.clone());
    }

    let confirmations = known_confirmations(prior, &evidence.confirmations);
    let base = ModelRequest {
        system: prompts::VERIFICATION_SYSTEM.to_string(),
        user: prompts::verification_user(prior, &evidence.notes, &confirmations),
        image: evidence.image.clone(),
    };

    let judgment =
        with_correction_retries(client, cache, config, &base, "verification", parse_judgment)
            .await?;
    debug!(status = judgment.status.as_str(), "verification judgment received");
    Ok(merge(prior, &judgment))
}

/// Invoke the model and parse its reply, feeding parse failures back to the
/// model as a correction request.
async fn with_correction_retries<C, T>(
    client: &C,
    cache: &ModelCache,
    config: &Config,
    base: &ModelRequest,
    context_hint: &str,
    parse: impl Fn(&str) -> Result<T, DiagnosisFailure>,
) -> anyhow::Result<T>
where
    C: ModelClient + ?Sized,
{
    let attempts = config.max_parse_attempts.max(1);
    let mut request = base.clone();
    let mut last_failure: Option<DiagnosisFailure> = None;

    for attempt in 1..=attempts {
        let reply = invoke_with_fallback(client, cache, config, &request).await?;
        match parse(&reply.content) {
            Ok(parsed) => {
                if attempt > 1 {
                    info!(attempt, context = context_hint, "response usable after correction");
                }
                return Ok(parsed);
            }
            Err(failure) => {
                warn!(
                    attempt,
                    model = %reply.model,
                    context = context_hint,
                    error = %failure,
                    preview = %truncate_str(&reply.content, 200),
                    "model response could not be used"
                );
                let problem = failure.to_string();
                request = ModelRequest {
                    user: prompts::correction_user(&base.user, &reply.content, &problem),
                    ..base.clone()
                };
                last_failure = Some(failure);
            }
        }
    }

    let failure = last_failure
        .unwrap_or_else(|| DiagnosisFailure::Decode("no response received".to_string()));
    Err(anyhow::Error::new(failure).context(format!(
        "{} response unusable after {} attempt(s)",
        context_hint, attempts
    )))
}
