use crate::diagnosis::DiagnosisResult;
use crate::util::truncate;

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED BUILDING BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Caps on user-supplied text embedded in prompts (characters)
const MAX_DESCRIPTION_CHARS: usize = 6_000;
const MAX_CODE_CHARS: usize = 12_000;
const MAX_NOTES_CHARS: usize = 4_000;
const MAX_ORIGINAL_RESPONSE_CHARS: usize = 4_000;

/// Output contract shared by the diagnosis and correction prompts
const DIAGNOSIS_SCHEMA: &str = r#"OUTPUT (JSON object only):
{
  "title": "Short name for the problem",
  "confidence": "low|medium|high",
  "summary": "Two or three plain sentences",
  "likely_causes": ["Most likely cause first"],
  "fix_steps": [{"step": 1, "action": "What to do", "why": "Why it helps"}],
  "verification": ["Observable check that proves the fix worked"],
  "explanation_beginner": "Explanation for someone new to electronics or code",
  "explanation_advanced": "Precise technical explanation",
  "explanation_beginner_sankofa": "Optional: beginner explanation grounded in a familiar everyday analogy",
  "code_snippet": {"language": "cpp|c|python|text", "content": "Optional corrected code"},
  "safety_notes": ["Optional"],
  "assumptions": ["Optional: what you assumed but could not see"],
  "uncertainty_zones": [{"area": "...", "reason": "...", "how_to_verify": "..."}],
  "intent_mismatch": [{"expected": "...", "observed": "...", "impact": "..."}],
  "failure_risks": [{"risk": "...", "likelihood": "low|medium|high", "prevention": "...", "time_horizon": "Optional"}]
}"#;

const DIAGNOSIS_RULES: &str = r#"RULES:
- Use only the evidence provided. Say what you assumed in `assumptions`.
- If anything important is unclear, list it in `uncertainty_zones` and do not use "high" confidence.
- `fix_steps` are numbered from 1 in the order they should be done.
- `verification` items are short, observable checks the user can confirm later.
- Never include `status` or `why_this_fix_worked`.
- No markdown, no commentary, no text outside the JSON object."#;

// ═══════════════════════════════════════════════════════════════════════════════
// PROMPTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn diagnosis_system() -> String {
    format!(
        "You are a patient hardware and embedded-code troubleshooter.\n\n{}\n\n{}",
        DIAGNOSIS_SCHEMA, DIAGNOSIS_RULES
    )
}

pub fn diagnosis_user(description: &str, code: Option<&str>, has_image: bool) -> String {
    let mut prompt = format!(
        "PROBLEM DESCRIPTION:\n{}\n",
        truncate(description.trim(), MAX_DESCRIPTION_CHARS)
    );
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\nCODE:\n");
        prompt.push_str(&truncate(code, MAX_CODE_CHARS));
        prompt.push('\n');
    }
    if has_image {
        prompt.push_str(
            "\nA photo of the setup is attached. Describe only what it actually shows.\n",
        );
    }
    prompt
}

pub const VERIFICATION_SYSTEM: &str = r#"You judge whether a previously suggested fix has worked.

You will receive the earlier diagnosis, new evidence from the user, and the verification checks the user says they confirmed.

OUTPUT (JSON object only):
{"status": "resolved|pending", "rationale": "One or two sentences explaining the judgment"}

RULES:
- Answer "resolved" only when the new evidence shows the problem is gone.
- When evidence is missing, ambiguous, or contradicts the fix, answer "pending".
- When resolved, the rationale explains why the fix worked.
- No markdown, no commentary, no text outside the JSON object."#;

pub fn verification_user(prior: &DiagnosisResult, notes: &str, confirmations: &[String]) -> String {
    let prior_json = serde_json::to_string_pretty(prior).unwrap_or_else(|_| prior.summary.clone());
    let mut prompt = format!("EARLIER DIAGNOSIS:\n{}\n", prior_json);

    prompt.push_str("\nCONFIRMED CHECKS:\n");
    if confirmations.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for check in confirmations {
            prompt.push_str("- ");
            prompt.push_str(check);
            prompt.push('\n');
        }
    }

    let notes = notes.trim();
    prompt.push_str("\nNEW EVIDENCE:\n");
    if notes.is_empty() {
        prompt.push_str("(no written notes)\n");
    } else {
        prompt.push_str(&truncate(notes, MAX_NOTES_CHARS));
        prompt.push('\n');
    }
    prompt
}

/// Follow-up prompt asking the model to repair a response that could not be used.
pub fn correction_user(original_user: &str, original_response: &str, problem: &str) -> String {
    format!(
        "{}\n\nYOUR PREVIOUS RESPONSE COULD NOT BE USED.\n\
         Problem: {}\n\n\
         Previous response:\n{}\n\n\
         Reply again with ONLY the corrected JSON object, keeping all valid content.",
        original_user,
        problem,
        truncate(original_response, MAX_ORIGINAL_RESPONSE_CHARS)
    )
}
