use super::error::ExtractError;
use regex::Regex;
use std::sync::OnceLock;

/// A response that is nothing but one fenced block, optionally tagged `json`.
static FENCED_BLOCK: OnceLock<Option<Regex>> = OnceLock::new();

fn fenced_block() -> Option<&'static Regex> {
    FENCED_BLOCK
        .get_or_init(|| Regex::new(r"(?s)\A```(?i:json)?[ \t]*\r?\n?(.*?)\r?\n?```\z").ok())
        .as_ref()
}

/// Strip markdown code fences from a response.
///
/// A fully fenced response is unwrapped; otherwise a stray opening or closing
/// marker is dropped on its own, since model output does not always close
/// what it opens.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(inner) = fenced_block()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
    {
        return inner.as_str().trim();
    }

    let clean = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let has_tag = rest
                .get(..4)
                .is_some_and(|tag| tag.eq_ignore_ascii_case("json"));
            if has_tag {
                &rest[4..]
            } else {
                rest
            }
        }
        None => trimmed,
    };
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

/// Return the balanced `{...}` span starting at byte offset `start`.
///
/// Braces inside string literals do not count toward nesting depth.
fn balanced_object_from(text: &str, start: usize) -> Option<&str> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the JSON object from a model response.
///
/// Handles markdown fences and prose before or after the object. The
/// returned span begins at the first `{` and ends at its matching `}`, so
/// running `extract` on its own output yields the same string.
pub fn extract(raw: &str) -> Result<&str, ExtractError> {
    let clean = strip_markdown_fences(raw);
    let start = clean.find('{').ok_or(ExtractError::NotFound)?;
    balanced_object_from(clean, start).ok_or(ExtractError::NotFound)
}
