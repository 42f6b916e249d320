use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::warn;

use crate::model::{ValidationLimits, DEFAULT_MAX_URL_LEN};
use crate::query::{RandomPolicy, DEFAULT_RECENT_LIMIT};

pub const SETTINGS_FILE: &str = "gallery.toml";
pub const DEFAULT_SUGGESTION_LIMIT: usize = 25;

/// Runtime settings, read from `gallery.toml` and `GALLERY_*` env vars.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `gallery.json` and `config.json`.
    pub data_dir: Option<PathBuf>,
    pub recent_limit: usize,
    pub max_url_len: usize,
    /// Let random picks serve NSFW entries in NSFW contexts.
    pub nsfw_random: bool,
    pub suggestion_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            recent_limit: DEFAULT_RECENT_LIMIT,
            max_url_len: DEFAULT_MAX_URL_LEN,
            nsfw_random: false,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

impl Settings {
    /// Load from `path` if given (must exist), else from the default config
    /// location if present, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => {
                let raw = fs::read_to_string(p).with_context(|| format!("reading settings: {}", p.display()))?;
                Self::from_toml_str(&raw).with_context(|| format!("parsing settings: {}", p.display()))?
            }
            None => default_settings_path()
                .and_then(|p| fs::read_to_string(&p).ok().map(|raw| (p, raw)))
                .map(|(p, raw)| {
                    Self::from_toml_str(&raw).unwrap_or_else(|e| {
                        warn!(path = %p.display(), error = %e, "ignoring unreadable settings file");
                        Self::default()
                    })
                })
                .unwrap_or_default(),
        };
        settings.apply_env_from(|k| std::env::var(k).ok());
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = get("GALLERY_DATA_DIR").filter(|s| !s.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = get("GALLERY_RECENT_LIMIT").and_then(|s| s.parse().ok()) {
            self.recent_limit = n;
        }
        if let Some(n) = get("GALLERY_MAX_URL_LEN").and_then(|s| s.parse().ok()) {
            self.max_url_len = n;
        }
        if let Some(b) = get("GALLERY_NSFW_RANDOM").and_then(|s| parse_flag(&s)) {
            self.nsfw_random = b;
        }
        if let Some(n) = get("GALLERY_SUGGESTION_LIMIT").and_then(|s| s.parse().ok()) {
            self.suggestion_limit = n;
        }
    }

    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits { max_url_len: self.max_url_len }
    }

    pub fn random_policy(&self) -> RandomPolicy {
        RandomPolicy { nsfw_random: self.nsfw_random }
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::filestore::default_data_dir(),
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "gallery", "gallery").map(|p| p.config_dir().join(SETTINGS_FILE))
}
