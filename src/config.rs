//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `COURIER_WORK_DIR` and
//! `COURIER_LOG_LEVEL` env overrides. A missing default file is not an
//! error: built-in defaults are used instead.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::session::{ScriptEntry, default_script};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Per-run session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target DID used instead of the interactive prompt. Still validated.
    pub target: Option<String>,
    /// Configured script. `None` means the built-in demonstration script.
    pub messages: Option<Vec<ScriptEntry>>,
}

/// Fully-resolved agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent_name: String,
    /// Working directory for persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    /// Secrets file path, resolved against `work_dir` when relative.
    pub secrets_file: PathBuf,
    pub log_level: String,
    pub session: SessionConfig,
}

impl Config {
    /// The messages to send, in order.
    pub fn script(&self) -> Vec<ScriptEntry> {
        match &self.session.messages {
            Some(messages) => messages.clone(),
            None => default_script(),
        }
    }
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    session: RawSession,
}

#[derive(Deserialize)]
struct RawAgent {
    #[serde(default = "default_agent_name")]
    name: String,
    #[serde(default = "default_work_dir")]
    work_dir: String,
    #[serde(default = "default_secrets_file")]
    secrets_file: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawAgent {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            work_dir: default_work_dir(),
            secrets_file: default_secrets_file(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawSession {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    messages: Option<Vec<ScriptEntry>>,
}

fn default_agent_name() -> String { "courier".to_string() }
fn default_work_dir() -> String { "~/.courier".to_string() }
fn default_secrets_file() -> String { "secrets.json".to_string() }
fn default_log_level() -> String { "info".to_string() }

/// Load config from `path` (or `config/default.toml`), then apply env-var
/// overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("COURIER_WORK_DIR").ok();
    let log_level_override = env::var("COURIER_LOG_LEVEL").ok();

    match path {
        Some(p) => load_from(
            Path::new(p),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        ),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from(
            Path::new(DEFAULT_CONFIG_PATH),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        ),
        None => resolve(
            RawConfig::default(),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        ),
    }
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, work_dir_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let a = parsed.agent;

    let work_dir = expand_home(work_dir_override.unwrap_or(&a.work_dir));
    let log_level = log_level_override.unwrap_or(&a.log_level).to_string();

    let secrets_file = expand_home(&a.secrets_file);
    let secrets_file = if secrets_file.is_absolute() {
        secrets_file
    } else {
        work_dir.join(secrets_file)
    };

    let target = parsed
        .session
        .target
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if let Some(messages) = &parsed.session.messages {
        if messages.is_empty() {
            return Err(AppError::Config("[[session.messages]] must not be empty".into()));
        }
    }

    Ok(Config {
        agent_name: a.name,
        work_dir,
        secrets_file,
        log_level,
        session: SessionConfig { target, messages: parsed.session.messages },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            agent_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            secrets_file: work_dir.join("secrets.json"),
            log_level: "info".into(),
            session: SessionConfig { target: None, messages: None },
        }
    }
}
