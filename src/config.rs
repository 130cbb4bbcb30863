use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::SearchConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Pause after each scripted step, in order. Missing entries mean no pause.
    pub step_delays_ms: Vec<u64>,
    /// Abort pending steps when the run is stopped.
    pub cancel_on_stop: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            step_delays_ms: vec![1000, 1500, 2000, 1000],
            cancel_on_stop: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub run: RunSettings,
    pub log: LogSettings,
}

impl Config {
    /// A missing file is not an error: defaults apply.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("JOBHUNTER_CONFIG") {
            return Ok(expand_tilde(&path));
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobhunter") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Ok(PathBuf::from("jobhunter.toml"))
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log.file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("jobhunter.log")),
        }
    }
}

/// Where the history database and log file live.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("JOBHUNTER_DATA_DIR") {
        return Ok(expand_tilde(&path));
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobhunter") {
        Ok(proj_dirs.data_dir().to_path_buf())
    } else {
        Ok(PathBuf::from("."))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
