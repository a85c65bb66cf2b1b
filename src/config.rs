//! Configuration management for fixlens
//!
//! Stores settings in ~/.config/fixlens/config.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable that overrides the configured default model
pub const MODEL_ENV_VAR: &str = "FIXLENS_MODEL";

/// Model used when nothing is cached and nothing is configured
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model tried first when no working model has been cached yet
    pub default_model: String,
    /// Preferred order for the discovery fallback. Listed models not named
    /// here are still tried, after these.
    pub fallback_models: Vec<String>,
    /// Maximum number of discovered models to try after the first one fails
    pub max_fallback_models: usize,
    /// Attempts at getting a well-formed response before giving up
    pub max_parse_attempts: u32,
    /// Log filter used when FIXLENS_LOG is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            fallback_models: Vec::new(),
            max_fallback_models: 3,
            max_parse_attempts: 2,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fixlens"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from the default location, or return defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default().with_env_overrides(),
        }
    }

    /// Load config from an explicit path.
    ///
    /// A missing file yields defaults. A corrupt file is set aside as
    /// `config.json.corrupt` so the user's edits are not lost.
    pub fn load_from(path: &Path) -> Self {
        let config = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(err) => {
                    preserve_corrupt_config(path, &content);
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "config file was corrupted; a backup was saved and defaults were loaded"
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.sanitized().with_env_overrides()
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path()
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Get a displayable config location
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn with_env_overrides(self) -> Self {
        let model = std::env::var(MODEL_ENV_VAR).ok();
        self.with_model_override(model.as_deref())
    }

    fn with_model_override(mut self, model: Option<&str>) -> Self {
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            self.default_model = model.to_string();
        }
        self
    }

    fn sanitized(mut self) -> Self {
        if self.default_model.trim().is_empty() {
            self.default_model = DEFAULT_MODEL.to_string();
        }
        self.max_parse_attempts = self.max_parse_attempts.max(1);
        self.fallback_models.retain(|m| !m.trim().is_empty());
        self
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        warn!("failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}
