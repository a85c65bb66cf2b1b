use std::sync::Mutex;

/// Remembers the last model that produced a response.
///
/// Owned by whoever handles requests and shared by reference. Concurrent
/// writers simply overwrite each other; the worst case is one extra discovery
/// round, so no ordering between requests is enforced.
#[derive(Debug, Default)]
pub struct ModelCache {
    preferred: Mutex<Option<String>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.preferred
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set(&self, model: impl Into<String>) {
        let mut guard = self.preferred.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(model.into());
    }

    pub fn clear(&self) {
        let mut guard = self.preferred.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

/// Listing endpoints report names like `models/gemini-1.5-pro`; calls take
/// the bare identifier.
pub(crate) fn normalize_model_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix("models/").unwrap_or(trimmed)
}

/// Order discovered models for the fallback chain.
///
/// Configured preferences come first (in config order, when listed), then
/// the remaining listed models in listing order. Names in `tried` are
/// skipped and duplicates collapse.
pub(crate) fn rank_candidates(
    listed: &[String],
    preferred: &[String],
    tried: &[String],
) -> Vec<String> {
    let listed: Vec<&str> = listed
        .iter()
        .map(|m| normalize_model_name(m))
        .filter(|m| !m.is_empty())
        .collect();

    let mut out: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !tried.iter().any(|t| t == name) && !out.iter().any(|o| o == name) {
            out.push(name.to_string());
        }
    };

    for want in preferred {
        let want = normalize_model_name(want);
        if listed.contains(&want) {
            push(want);
        }
    }
    for name in &listed {
        push(*name);
    }
    out
}
