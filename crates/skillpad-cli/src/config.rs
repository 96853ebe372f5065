//! Application configuration.
//!
//! Loaded from an optional TOML file (`$SKILLPAD_CONFIG`, default
//! `<config-dir>/skillpad/config.toml`), then overridden by `SKILLPAD_*`
//! environment variables.  Every field has a default, so a missing file is
//! not an error.
//!
//! ```toml
//! store = "/path/to/skillpad.json"
//! lock_file = "~/.agents/.skill-lock.json"
//!
//! [endpoints]
//! gallery_api = "https://skills.sh/api"
//!
//! [update]
//! manifest_url = "https://example.com/latest.json"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use skillpad_skills::{Endpoints, default_lock_file, expand_tilde};
use tracing::debug;

use crate::update::release::DEFAULT_MANIFEST_URL;

const CONFIG_ENV: &str = "SKILLPAD_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persisted store document.
    pub store: Option<PathBuf>,
    /// The skills CLI's lock file.
    pub lock_file: Option<PathBuf>,
    pub endpoints: Endpoints,
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub manifest_url: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_owned(),
        }
    }
}

impl AppConfig {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Apply `SKILLPAD_*` overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let overrides = [
            ("SKILLPAD_GALLERY_API", &mut self.endpoints.gallery_api),
            ("SKILLPAD_GALLERY_SITE", &mut self.endpoints.gallery_site),
            ("SKILLPAD_GITHUB_API", &mut self.endpoints.github_api),
            ("SKILLPAD_RAW_CONTENT", &mut self.endpoints.raw_content),
            ("SKILLPAD_UPDATE_CHECK_URL", &mut self.endpoints.update_check),
            ("SKILLPAD_UPDATE_MANIFEST_URL", &mut self.update.manifest_url),
        ];
        for (key, field) in overrides {
            if let Some(value) = var(key).filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }

        if let Some(store) = var("SKILLPAD_STORE").filter(|v| !v.trim().is_empty()) {
            self.store = Some(PathBuf::from(store));
        }
        if let Some(lock) = var("SKILLPAD_LOCK_FILE").filter(|v| !v.trim().is_empty()) {
            self.lock_file = Some(PathBuf::from(lock));
        }
    }

    /// Path of the persisted store document.
    pub fn store_path(&self) -> PathBuf {
        match &self.store {
            Some(path) => expand_path(path),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("skillpad")
                .join("skillpad.json"),
        }
    }

    /// `None` only when no home directory can be found.
    pub fn lock_file_path(&self) -> Option<PathBuf> {
        match &self.lock_file {
            Some(path) => Some(expand_path(path)),
            None => default_lock_file(),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skillpad").join("config.toml"))
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_tilde(s),
        None => path.to_path_buf(),
    }
}
