//! Validation and coercion of decoded model output into a [`DiagnosisResult`].
//!
//! The model is trusted for content, not for shape. Every field is checked,
//! every violation is reported in one pass, and a result is only produced
//! when nothing is wrong.

use super::error::{FieldError, ValidationErrors};
use super::{
    CodeSnippet, Confidence, DiagnosisResult, FailureRisk, FixStatus, FixStep, IntentMismatch,
    SnippetLanguage, UncertaintyZone,
};
use serde_json::{Map, Value};
use tracing::debug;

type Object = Map<String, Value>;

/// Validate a decoded JSON value and build the canonical diagnosis.
///
/// Returns every structural error found, in field order. On success the
/// confidence invariant has been applied: an unverified diagnosis that lists
/// uncertainty zones is never reported with high confidence. Resolved records
/// pass through as merged.
pub fn normalize(value: &Value) -> Result<DiagnosisResult, ValidationErrors> {
    let Some(obj) = value.as_object() else {
        return Err(FieldError::NotAnObject.into());
    };

    let mut errors = ValidationErrors::new();

    let title = required_text(obj, "title", &mut errors);
    let confidence = required_confidence(obj, &mut errors);
    let summary = required_text(obj, "summary", &mut errors);
    let likely_causes = required_string_list(obj, "likely_causes", &mut errors);
    let fix_steps = required_fix_steps(obj, &mut errors);
    let verification = required_string_list(obj, "verification", &mut errors);
    let explanation_beginner = required_text(obj, "explanation_beginner", &mut errors);
    let explanation_advanced = required_text(obj, "explanation_advanced", &mut errors);

    let explanation_beginner_sankofa =
        optional_text(obj, "explanation_beginner_sankofa", &mut errors);
    let code_snippet = optional_code_snippet(obj, &mut errors);
    let safety_notes = optional_string_list(obj, "safety_notes", &mut errors);
    let assumptions = optional_string_list(obj, "assumptions", &mut errors);
    let uncertainty_zones = optional_records(obj, "uncertainty_zones", &mut errors, |rec| {
        let area = rec.string("area");
        let reason = rec.string("reason");
        let how_to_verify = rec.string("how_to_verify");
        Some(UncertaintyZone {
            area: area?,
            reason: reason?,
            how_to_verify: how_to_verify?,
        })
    });
    let intent_mismatch = optional_records(obj, "intent_mismatch", &mut errors, |rec| {
        let expected = rec.string("expected");
        let observed = rec.string("observed");
        let impact = rec.string("impact");
        Some(IntentMismatch {
            expected: expected?,
            observed: observed?,
            impact: impact?,
        })
    });
    let failure_risks = optional_records(obj, "failure_risks", &mut errors, |rec| {
        let risk = rec.string("risk");
        let likelihood = coerce_likelihood(rec.obj.get("likelihood"));
        let prevention = rec.string("prevention");
        let time_horizon = rec.optional_string("time_horizon");
        Some(FailureRisk {
            risk: risk?,
            likelihood,
            prevention: prevention?,
            time_horizon: time_horizon?,
        })
    });
    let status = optional_status(obj, &mut errors);
    let why_this_fix_worked = optional_text(obj, "why_this_fix_worked", &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    let (
        Some(title),
        Some(confidence),
        Some(summary),
        Some(likely_causes),
        Some(fix_steps),
        Some(verification),
        Some(explanation_beginner),
        Some(explanation_advanced),
    ) = (
        title,
        confidence,
        summary,
        likely_causes,
        fix_steps,
        verification,
        explanation_beginner,
        explanation_advanced,
    )
    else {
        // Every None above pushed an error, so this is unreachable in practice.
        return Err(errors);
    };

    let mut result = DiagnosisResult {
        title,
        confidence,
        summary,
        likely_causes,
        fix_steps,
        verification,
        explanation_beginner,
        explanation_advanced,
        explanation_beginner_sankofa,
        code_snippet,
        safety_notes,
        assumptions,
        uncertainty_zones,
        intent_mismatch,
        failure_risks,
        status,
        why_this_fix_worked,
    };

    // A verified fix keeps the confidence it was resolved with.
    if result.is_resolved() {
        return Ok(result);
    }

    if result.has_uncertainty() && result.confidence == Confidence::High {
        debug!("downgrading confidence to medium: uncertainty zones present");
        result.confidence = Confidence::Medium;
    }
    // The explanation only belongs to a verified fix.
    result.why_this_fix_worked = None;

    Ok(result)
}

/// Look up a field, treating JSON `null` as absent.
fn present<'a>(obj: &'a Object, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|value| !value.is_null())
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_text(obj: &Object, key: &str, errors: &mut ValidationErrors) -> Option<String> {
    let Some(value) = present(obj, key) else {
        errors.push(FieldError::Missing {
            field: key.to_string(),
        });
        return None;
    };
    let text = non_blank(value);
    if text.is_none() {
        errors.push(FieldError::EmptyString {
            field: key.to_string(),
        });
    }
    text
}

fn required_confidence(obj: &Object, errors: &mut ValidationErrors) -> Option<Confidence> {
    let Some(value) = present(obj, "confidence") else {
        errors.push(FieldError::Missing {
            field: "confidence".to_string(),
        });
        return None;
    };
    let confidence = value.as_str().and_then(Confidence::parse);
    if confidence.is_none() {
        errors.push(FieldError::InvalidConfidence);
    }
    confidence
}

/// Trimmed, non-blank string elements. `None` if any element is not a string.
fn string_items(items: &[Value]) -> Option<Vec<String>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = item.as_str()?.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
    }
    Some(out)
}

fn string_list(value: &Value, key: &str, errors: &mut ValidationErrors) -> Option<Vec<String>> {
    let Some(items) = value.as_array() else {
        errors.push(FieldError::NotAnArray {
            field: key.to_string(),
        });
        return None;
    };
    let list = string_items(items);
    if list.is_none() {
        errors.push(FieldError::NonStringItem {
            field: key.to_string(),
        });
    }
    list
}

fn required_string_list(
    obj: &Object,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<Vec<String>> {
    match present(obj, key) {
        Some(value) => string_list(value, key, errors),
        None => {
            errors.push(FieldError::Missing {
                field: key.to_string(),
            });
            None
        }
    }
}

/// An empty list is treated the same as an absent one.
fn optional_string_list(
    obj: &Object,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<Vec<String>> {
    let list = string_list(present(obj, key)?, key, errors)?;
    (!list.is_empty()).then_some(list)
}

fn optional_text(obj: &Object, key: &str, errors: &mut ValidationErrors) -> Option<String> {
    let value = present(obj, key)?;
    if !value.is_string() {
        errors.push(FieldError::NotAString {
            field: key.to_string(),
        });
        return None;
    }
    non_blank(value)
}

fn optional_status(obj: &Object, errors: &mut ValidationErrors) -> Option<FixStatus> {
    let value = present(obj, "status")?;
    let status = match value.as_str().map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if s == "pending" => Some(FixStatus::Pending),
        Some(s) if s == "resolved" => Some(FixStatus::Resolved),
        _ => None,
    };
    if status.is_none() {
        errors.push(FieldError::InvalidStatus);
    }
    status
}

/// Accept integers, integral floats and numeric strings.
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_likelihood(value: Option<&Value>) -> Confidence {
    let Some(raw) = value.and_then(Value::as_str) else {
        return Confidence::Medium;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "low" | "very low" | "unlikely" | "rare" => Confidence::Low,
        "high" | "very high" | "likely" | "very likely" | "critical" => Confidence::High,
        _ => Confidence::Medium,
    }
}

fn coerce_language(value: Option<&Value>) -> SnippetLanguage {
    let Some(raw) = value.and_then(Value::as_str) else {
        return SnippetLanguage::Text;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "cpp" | "c++" | "cxx" | "arduino" | "ino" => SnippetLanguage::Cpp,
        "c" => SnippetLanguage::C,
        "python" | "py" | "python3" | "micropython" => SnippetLanguage::Python,
        _ => SnippetLanguage::Text,
    }
}

fn optional_code_snippet(obj: &Object, errors: &mut ValidationErrors) -> Option<CodeSnippet> {
    let value = present(obj, "code_snippet")?;
    let Some(snippet) = value.as_object() else {
        errors.push(FieldError::ElementNotObject {
            path: "code_snippet".to_string(),
        });
        return None;
    };
    let Some(content) = snippet.get("content").and_then(Value::as_str) else {
        errors.push(FieldError::ElementNotString {
            path: "code_snippet.content".to_string(),
        });
        return None;
    };
    Some(CodeSnippet {
        language: coerce_language(snippet.get("language")),
        content: content.to_string(),
    })
}

/// Field reader for one element of a list-of-objects field.
///
/// Each accessor records its own error with an index-qualified path so a
/// single element can report several problems at once.
struct RecordReader<'a, 'e> {
    obj: &'a Object,
    prefix: String,
    errors: &'e mut ValidationErrors,
}

impl RecordReader<'_, '_> {
    fn string(&mut self, key: &str) -> Option<String> {
        match self.obj.get(key).and_then(Value::as_str) {
            Some(s) => Some(s.trim().to_string()),
            None => {
                self.errors.push(FieldError::ElementNotString {
                    path: format!("{}.{}", self.prefix, key),
                });
                None
            }
        }
    }

    /// Outer `None` marks an error; inner `None` means absent.
    fn optional_string(&mut self, key: &str) -> Option<Option<String>> {
        match self.obj.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                Some((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Some(_) => {
                self.errors.push(FieldError::ElementNotString {
                    path: format!("{}.{}", self.prefix, key),
                });
                None
            }
        }
    }
}

fn optional_records<T>(
    obj: &Object,
    key: &str,
    errors: &mut ValidationErrors,
    mut read: impl FnMut(&mut RecordReader<'_, '_>) -> Option<T>,
) -> Option<Vec<T>> {
    let value = present(obj, key)?;
    let Some(items) = value.as_array() else {
        errors.push(FieldError::NotAnArray {
            field: key.to_string(),
        });
        return None;
    };

    let mut out = Vec::with_capacity(items.len());
    let mut ok = true;
    for (idx, item) in items.iter().enumerate() {
        let prefix = format!("{}[{}]", key, idx);
        let Some(record) = item.as_object() else {
            errors.push(FieldError::ElementNotObject { path: prefix });
            ok = false;
            continue;
        };
        let mut reader = RecordReader {
            obj: record,
            prefix,
            errors: &mut *errors,
        };
        match read(&mut reader) {
            Some(parsed) => out.push(parsed),
            None => ok = false,
        }
    }

    (ok && !out.is_empty()).then_some(out)
}

fn required_fix_steps(obj: &Object, errors: &mut ValidationErrors) -> Option<Vec<FixStep>> {
    let Some(value) = present(obj, "fix_steps") else {
        errors.push(FieldError::Missing {
            field: "fix_steps".to_string(),
        });
        return None;
    };
    let Some(items) = value.as_array() else {
        errors.push(FieldError::NotAnArray {
            field: "fix_steps".to_string(),
        });
        return None;
    };

    let mut steps = Vec::with_capacity(items.len());
    let mut ok = true;
    for (idx, item) in items.iter().enumerate() {
        let prefix = format!("fix_steps[{}]", idx);
        let Some(record) = item.as_object() else {
            errors.push(FieldError::ElementNotObject { path: prefix });
            ok = false;
            continue;
        };
        let step = record.get("step").and_then(coerce_integer);
        if step.is_none() {
            errors.push(FieldError::ElementNotInteger {
                path: format!("{}.step", prefix),
            });
        }
        let mut reader = RecordReader {
            obj: record,
            prefix,
            errors: &mut *errors,
        };
        let action = reader.string("action");
        let why = reader.string("why");
        match (step, action, why) {
            (Some(step), Some(action), Some(why)) => steps.push(FixStep { step, action, why }),
            _ => ok = false,
        }
    }

    ok.then_some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "title": "Motor driver overheating",
            "confidence": "low",
            "summary": "The L298N is sinking too much current.",
            "likely_causes": ["Stall current exceeds rating", "No heatsink"],
            "fix_steps": [
                {"step": 1, "action": "Add a heatsink", "why": "Dissipates heat"},
                {"step": 2, "action": "Limit PWM duty", "why": "Reduces average current"}
            ],
            "verification": ["Driver stays cool after 5 minutes"],
            "explanation_beginner": "The chip gets hot because it works too hard.",
            "explanation_advanced": "Linear H-bridge losses scale with I^2 * Rds."
        })
    }

    fn with(mut base: Value, key: &str, value: Value) -> Value {
        base[key] = value;
        base
    }

    fn without(mut base: Value, key: &str) -> Value {
        if let Some(obj) = base.as_object_mut() {
            obj.remove(key);
        }
        base
    }

    #[test]
    fn test_valid_minimal_object() {
        let result = normalize(&valid()).unwrap();
        assert_eq!(result.title, "Motor driver overheating");
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.fix_steps.len(), 2);
        assert_eq!(result.fix_steps[1].step, 2);
        assert!(result.uncertainty_zones.is_none());
        assert!(result.status.is_none());
        assert!(result.code_snippet.is_none());
    }

    #[test]
    fn test_non_object_is_rejected_with_single_error() {
        let errors = normalize(&json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(errors.into_inner(), vec![FieldError::NotAnObject]);
        assert!(normalize(&json!("text")).is_err());
    }

    #[test]
    fn test_reports_every_missing_required_field() {
        let errors = normalize(&json!({})).unwrap_err();
        let messages = errors.messages();
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[0], "Missing required field 'title'.");
        assert_eq!(messages[7], "Missing required field 'explanation_advanced'.");
    }

    #[test]
    fn test_one_error_per_malformed_field() {
        let value = without(with(valid(), "summary", json!("   ")), "verification");
        let value = with(value, "confidence", json!("certain"));
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec![
                "'confidence' must be one of: low, medium, high.".to_string(),
                "'summary' must be a non-empty string.".to_string(),
                "Missing required field 'verification'.".to_string(),
            ]
        );
    }

    #[test]
    fn test_likely_causes_must_contain_only_strings() {
        let value = with(valid(), "likely_causes", json!(["a", 5]));
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec!["'likely_causes' must contain only strings.".to_string()]
        );
    }

    #[test]
    fn test_high_confidence_with_uncertainty_is_downgraded() {
        let value = with(valid(), "confidence", json!("high"));
        let value = with(
            value,
            "uncertainty_zones",
            json!([{"area": "x", "reason": "y", "how_to_verify": "z"}]),
        );
        let result = normalize(&value).unwrap();
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.uncertainty_zones.unwrap()[0].how_to_verify, "z");
    }

    #[test]
    fn test_resolved_record_reloads_unchanged() {
        use crate::diagnosis::{merge, Judgment};

        let value = with(
            valid(),
            "uncertainty_zones",
            json!([{"area": "x", "reason": "y", "how_to_verify": "z"}]),
        );
        let prior = normalize(&value).unwrap();
        let resolved = merge(&prior, &Judgment::resolved("Heatsink keeps it cool"));
        assert_eq!(resolved.confidence, Confidence::High);

        let reloaded = normalize(&serde_json::to_value(&resolved).unwrap()).unwrap();
        assert_eq!(reloaded, resolved);
    }

    #[test]
    fn test_high_confidence_without_uncertainty_is_kept() {
        let value = with(valid(), "confidence", json!("high"));
        let value = with(value, "uncertainty_zones", json!([]));
        let result = normalize(&value).unwrap();
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.uncertainty_zones.is_none());
    }

    #[test]
    fn test_low_confidence_unchanged_with_or_without_zones() {
        assert_eq!(normalize(&valid()).unwrap().confidence, Confidence::Low);
        let value = with(valid(), "uncertainty_zones", json!([]));
        assert_eq!(normalize(&value).unwrap().confidence, Confidence::Low);
    }

    #[test]
    fn test_downgrade_skipped_when_other_errors_exist() {
        let value = with(valid(), "confidence", json!("high"));
        let value = with(
            value,
            "uncertainty_zones",
            json!([{"area": "x", "reason": "y", "how_to_verify": "z"}]),
        );
        let value = without(value, "title");
        assert!(normalize(&value).is_err());
    }

    #[test]
    fn test_list_of_object_errors_are_index_qualified() {
        let value = with(
            valid(),
            "uncertainty_zones",
            json!([
                {"area": "a", "reason": "r", "how_to_verify": "h"},
                "not an object",
                {"area": 3, "reason": "r"}
            ]),
        );
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec![
                "uncertainty_zones[1] must be an object.".to_string(),
                "uncertainty_zones[2].area must be a string.".to_string(),
                "uncertainty_zones[2].how_to_verify must be a string.".to_string(),
            ]
        );
    }

    #[test]
    fn test_failure_risk_likelihood_falls_back_to_medium() {
        let value = with(
            valid(),
            "failure_risks",
            json!([
                {"risk": "Burnout", "likelihood": "HIGH", "prevention": "Fuse"},
                {
                    "risk": "Noise",
                    "likelihood": "sometimes",
                    "prevention": "Caps",
                    "time_horizon": "weeks"
                },
                {"risk": "Drift", "likelihood": 0.4, "prevention": "Recalibrate"}
            ]),
        );
        let risks = normalize(&value).unwrap().failure_risks.unwrap();
        assert_eq!(risks[0].likelihood, Confidence::High);
        assert_eq!(risks[1].likelihood, Confidence::Medium);
        assert_eq!(risks[1].time_horizon.as_deref(), Some("weeks"));
        assert_eq!(risks[2].likelihood, Confidence::Medium);
        assert!(risks[2].time_horizon.is_none());
    }

    #[test]
    fn test_code_snippet_language_falls_back_to_text() {
        let value = with(
            valid(),
            "code_snippet",
            json!({"language": "Rust", "content": "fn main() {}"}),
        );
        let snippet = normalize(&value).unwrap().code_snippet.unwrap();
        assert_eq!(snippet.language, SnippetLanguage::Text);

        let value = with(
            valid(),
            "code_snippet",
            json!({"language": "C++", "content": "void loop() {}"}),
        );
        let snippet = normalize(&value).unwrap().code_snippet.unwrap();
        assert_eq!(snippet.language, SnippetLanguage::Cpp);
    }

    #[test]
    fn test_code_snippet_requires_string_content() {
        let value = with(valid(), "code_snippet", json!({"language": "c"}));
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec!["code_snippet.content must be a string.".to_string()]
        );
    }

    #[test]
    fn test_fix_step_numbers_are_coerced() {
        let value = with(
            valid(),
            "fix_steps",
            json!([
                {"step": "1", "action": "a", "why": "w"},
                {"step": 2.0, "action": "b", "why": "w"}
            ]),
        );
        let steps = normalize(&value).unwrap().fix_steps;
        assert_eq!(steps[0].step, 1);
        assert_eq!(steps[1].step, 2);
    }

    #[test]
    fn test_fix_step_errors_are_index_qualified() {
        let value = with(
            valid(),
            "fix_steps",
            json!([{"step": "first", "action": "a"}]),
        );
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec![
                "fix_steps[0].step must be an integer.".to_string(),
                "fix_steps[0].why must be a string.".to_string(),
            ]
        );
    }

    #[test]
    fn test_optional_lists_empty_or_null_are_omitted() {
        let value = with(valid(), "safety_notes", json!([]));
        let value = with(value, "assumptions", Value::Null);
        let value = with(value, "intent_mismatch", json!([]));
        let result = normalize(&value).unwrap();
        assert!(result.safety_notes.is_none());
        assert!(result.assumptions.is_none());
        assert!(result.intent_mismatch.is_none());

        let serialized = serde_json::to_value(&result).unwrap();
        assert!(serialized.get("safety_notes").is_none());
    }

    #[test]
    fn test_optional_list_with_wrong_shape_is_an_error() {
        let value = with(valid(), "safety_notes", json!("unplug first"));
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(messages, vec!["'safety_notes' must be an array.".to_string()]);
    }

    #[test]
    fn test_strings_are_trimmed() {
        let value = with(valid(), "title", json!("  Loose wire \n"));
        let value = with(value, "likely_causes", json!(["  a ", "   ", "b"]));
        let result = normalize(&value).unwrap();
        assert_eq!(result.title, "Loose wire");
        assert_eq!(result.likely_causes, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_why_this_fix_worked_cleared_unless_resolved() {
        let value = with(valid(), "why_this_fix_worked", json!("stale"));
        assert!(normalize(&value).unwrap().why_this_fix_worked.is_none());

        let pending = with(value.clone(), "status", json!("pending"));
        let result = normalize(&pending).unwrap();
        assert_eq!(result.status, Some(FixStatus::Pending));
        assert!(result.why_this_fix_worked.is_none());

        let resolved = with(value, "status", json!("Resolved"));
        let result = normalize(&resolved).unwrap();
        assert_eq!(result.status, Some(FixStatus::Resolved));
        assert_eq!(result.why_this_fix_worked.as_deref(), Some("stale"));
    }

    #[test]
    fn test_invalid_status_is_an_error() {
        let value = with(valid(), "status", json!("done"));
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec!["'status' must be one of: pending, resolved.".to_string()]
        );
    }

    #[test]
    fn test_optional_text_wrong_type_is_an_error() {
        let value = with(valid(), "explanation_beginner_sankofa", json!(42));
        let messages = normalize(&value).unwrap_err().messages();
        assert_eq!(
            messages,
            vec!["'explanation_beginner_sankofa' must be a string.".to_string()]
        );
    }
}
