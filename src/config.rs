//! Configuration loading with env-var overrides.
//!
//! Reads a TOML file (default `config/default.toml` relative to the current
//! working directory), then applies `ANSWER_STREAM_API_URL` and
//! `ANSWER_STREAM_LOG_LEVEL` env overrides. When the default file is absent
//! the built-in defaults are used; an explicitly named file must exist.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::answer::{AnswerParser, DEFAULT_SEPARATOR};
use crate::chat::DEFAULT_HISTORY_WINDOW;
use crate::error::AppError;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Chat backend endpoint settings (`[api]`).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend API; `/chat_stream` is appended.
    pub base_url: String,
    /// Whole-request HTTP timeout in seconds, streaming body included.
    pub timeout_seconds: u64,
}

/// Answer handling settings (`[answer]`).
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    /// Past exchanges sent with each question.
    pub history_window: usize,
    /// Shown when the backend closes the stream without any text.
    pub fallback_answer: String,
}

/// Fully-resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Append logs here instead of stderr (already expanded, no `~`).
    pub log_file: Option<PathBuf>,
    pub api: ApiConfig,
    pub answer: AnswerConfig,
    /// Parser built from `[answer].separator`.
    pub parser: AnswerParser,
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    client: RawClient,
    #[serde(default)]
    api: RawApi,
    #[serde(default)]
    answer: RawAnswer,
}

#[derive(Deserialize)]
struct RawClient {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

impl Default for RawClient {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_file: None }
    }
}

#[derive(Deserialize)]
struct RawApi {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawApi {
    fn default() -> Self {
        Self { base_url: default_base_url(), timeout_seconds: default_timeout_seconds() }
    }
}

#[derive(Deserialize)]
struct RawAnswer {
    #[serde(default = "default_separator")]
    separator: String,
    #[serde(default = "default_history_window")]
    history_window: usize,
    #[serde(default = "default_fallback_answer")]
    fallback_answer: String,
}

impl Default for RawAnswer {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            history_window: default_history_window(),
            fallback_answer: default_fallback_answer(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_base_url() -> String { "http://localhost:8000/api".to_string() }
fn default_timeout_seconds() -> u64 { 120 }
fn default_separator() -> String { DEFAULT_SEPARATOR.to_string() }
fn default_history_window() -> usize { DEFAULT_HISTORY_WINDOW }
fn default_fallback_answer() -> String {
    "Sorry, I could not find an answer to your question. Could you try asking it another way?".to_string()
}

/// Load config from `path` (or the default location), then apply env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let api_url_override = env::var("ANSWER_STREAM_API_URL").ok();
    let log_level_override = env::var("ANSWER_STREAM_LOG_LEVEL").ok();

    match path {
        Some(p) => load_from(Path::new(p), api_url_override.as_deref(), log_level_override.as_deref()),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from(
            Path::new(DEFAULT_CONFIG_PATH),
            api_url_override.as_deref(),
            log_level_override.as_deref(),
        ),
        None => resolve(RawConfig::default(), api_url_override.as_deref(), log_level_override.as_deref()),
    }
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    api_url_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, api_url_override, log_level_override)
}

fn resolve(
    raw: RawConfig,
    api_url_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let base_url = api_url_override.unwrap_or(&raw.api.base_url).trim().to_string();
    if base_url.is_empty() {
        return Err(AppError::Config("api.base_url must not be empty".into()));
    }
    if raw.api.timeout_seconds == 0 {
        return Err(AppError::Config("api.timeout_seconds must be greater than zero".into()));
    }

    let parser = AnswerParser::new(raw.answer.separator)?;

    Ok(Config {
        log_level: log_level_override.unwrap_or(&raw.client.log_level).to_string(),
        log_file: raw.client.log_file.as_deref().map(expand_home),
        api: ApiConfig { base_url, timeout_seconds: raw.api.timeout_seconds },
        answer: AnswerConfig {
            history_window: raw.answer.history_window,
            fallback_answer: raw.answer.fallback_answer,
        },
        parser,
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
