#![forbid(unsafe_code)]

//! Runtime settings resolution.
//!
//! Every value is looked up in the same order: explicit override (command
//! line), then the process environment, then the `.env` file, then the
//! built-in default. Blank values count as unset.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::liveness::DEFAULT_YT_DLP;
use crate::matcher::MatcherSettings;

pub const DEFAULT_ENV_PATH: &str = ".env";

pub const API_KEY_VAR: &str = "YOUTUBE_API_KEY";
pub const YT_DLP_VAR: &str = "YT_DLP";
pub const SIMILARITY_THRESHOLD_VAR: &str = "REFRESH_SIMILARITY_THRESHOLD";
pub const DURATION_TOLERANCE_VAR: &str = "REFRESH_DURATION_TOLERANCE";
pub const MAX_RESULTS_VAR: &str = "REFRESH_MAX_RESULTS";
pub const PAUSE_MS_VAR: &str = "REFRESH_PAUSE_MS";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// `None` disables replacement search.
    pub api_key: Option<String>,
    pub yt_dlp: PathBuf,
    pub matcher: MatcherSettings,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub api_key: Option<String>,
    pub yt_dlp: Option<PathBuf>,
    pub similarity_threshold: Option<f64>,
    pub duration_tolerance: Option<u64>,
    pub max_results: Option<usize>,
    pub pause_ms: Option<u64>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_runtime_settings(&file_vars, env_var_string, overrides)
}

fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeSettings> {
    let api_key = overrides
        .api_key
        .and_then(non_blank)
        .or_else(|| lookup_value(API_KEY_VAR, file_vars, &env_lookup));
    let yt_dlp = overrides
        .yt_dlp
        .or_else(|| lookup_value(YT_DLP_VAR, file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP));

    let mut matcher = MatcherSettings::default();
    if let Some(threshold) = pick(
        overrides.similarity_threshold,
        SIMILARITY_THRESHOLD_VAR,
        file_vars,
        &env_lookup,
    )? {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(anyhow!(
                "{SIMILARITY_THRESHOLD_VAR} must be between 0 and 100, got {threshold}"
            ));
        }
        matcher.similarity_threshold = threshold;
    }
    if let Some(tolerance) = pick(
        overrides.duration_tolerance,
        DURATION_TOLERANCE_VAR,
        file_vars,
        &env_lookup,
    )? {
        matcher.duration_tolerance = tolerance;
    }
    if let Some(max_results) = pick(overrides.max_results, MAX_RESULTS_VAR, file_vars, &env_lookup)?
    {
        if max_results == 0 {
            return Err(anyhow!("{MAX_RESULTS_VAR} must be at least 1"));
        }
        matcher.max_results = max_results;
    }
    if let Some(pause_ms) = pick(overrides.pause_ms, PAUSE_MS_VAR, file_vars, &env_lookup)? {
        matcher.pause = Duration::from_millis(pause_ms);
    }

    Ok(RuntimeSettings {
        api_key,
        yt_dlp,
        matcher,
    })
}

/// Override first, otherwise a parsed env/file value.
fn pick<T>(
    override_value: Option<T>,
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if override_value.is_some() {
        return Ok(override_value);
    }
    lookup_value(key, file_vars, env_lookup)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))
        })
        .transpose()
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
