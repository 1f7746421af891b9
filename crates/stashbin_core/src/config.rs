//! Configuration loading from defaults, an optional TOML file, and the environment.

use crate::constants::{
    DEFAULT_LEXER, DEFAULT_PASTE_SIZE, DEFAULT_PORT, DEFAULT_REAP_INTERVAL_SECS,
    DEFAULT_SLUG_MIN_WIDTH, DEFAULT_SLUG_RETRIES, DEFAULT_SPAMSCORE, ENV_PREFIX,
};
use crate::error::AppError;
use crate::limits::RateLimitConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for stashbin.
///
/// Every field has a default, so a TOML file only needs the keys it overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: String,
    pub host: String,
    pub port: u16,
    /// Ceiling for the summed rendered size of all files in one paste.
    pub paste_size: usize,
    /// Maximum link share (0-100) a file may have before it is rejected.
    pub spamscore: u32,
    /// Named expiry choices, in seconds. Zero means "never expires".
    pub expiries: BTreeMap<String, u64>,
    pub ratelimit: RateLimitConfig,
    pub slug_retries: u32,
    pub slug_min_width: usize,
    pub reap_interval_secs: u64,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP` when present.
    pub trust_forwarded_headers: bool,
    pub default_lexer: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut expiries = BTreeMap::new();
        expiries.insert("1day".to_string(), 86_400);
        expiries.insert("1week".to_string(), 604_800);

        Self {
            db_path: default_db_path(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            paste_size: DEFAULT_PASTE_SIZE,
            spamscore: DEFAULT_SPAMSCORE,
            expiries,
            ratelimit: RateLimitConfig::default(),
            slug_retries: DEFAULT_SLUG_RETRIES,
            slug_min_width: DEFAULT_SLUG_MIN_WIDTH,
            reap_interval_secs: DEFAULT_REAP_INTERVAL_SECS,
            trust_forwarded_headers: true,
            default_lexer: DEFAULT_LEXER.to_string(),
        }
    }
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

fn default_db_path() -> String {
    let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache")
        .join("stashbin")
        .join("db")
        .to_string_lossy()
        .to_string()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let name = format!("{}{}", ENV_PREFIX, key);
    let Some(raw) = lookup(&name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("Ignoring unparsable {}='{}'", name, raw),
    }
}

impl Config {
    /// Load configuration from defaults and environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    /// Load configuration from an optional TOML file, then apply env overrides.
    ///
    /// # Arguments
    /// - `path`: TOML file to read, if any.
    ///
    /// # Returns
    /// The merged configuration.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] when the file cannot be read or parsed, or
    /// when the merged values are unusable.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    AppError::Config(format!("Failed to read {}: {}", path.display(), err))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] when the document is not valid TOML or
    /// has mistyped values.
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        let mut config: Self =
            toml::from_str(raw).map_err(|err| AppError::Config(err.to_string()))?;
        config.db_path = expand_tilde(config.db_path);
        Ok(config)
    }

    /// Apply `STASHBIN_*` overrides produced by `lookup`.
    ///
    /// Rate limits and expiries are only configurable from the TOML file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(&format!("{}DB_PATH", ENV_PREFIX)) {
            self.db_path = expand_tilde(path);
        }
        if let Some(host) = lookup(&format!("{}HOST", ENV_PREFIX)) {
            if !host.trim().is_empty() {
                self.host = host.trim().to_string();
            }
        }
        override_parsed(&lookup, "PORT", &mut self.port);
        override_parsed(&lookup, "PASTE_SIZE", &mut self.paste_size);
        override_parsed(&lookup, "SPAMSCORE", &mut self.spamscore);
        override_parsed(&lookup, "SLUG_RETRIES", &mut self.slug_retries);
        override_parsed(&lookup, "SLUG_MIN_WIDTH", &mut self.slug_min_width);
        override_parsed(&lookup, "REAP_INTERVAL_SECS", &mut self.reap_interval_secs);
        if let Some(raw) = lookup(&format!("{}TRUST_FORWARDED_HEADERS", ENV_PREFIX)) {
            match parse_env_flag(&raw) {
                Some(flag) => self.trust_forwarded_headers = flag,
                None => tracing::warn!("Ignoring unrecognized TRUST_FORWARDED_HEADERS='{}'", raw),
            }
        }
        if let Some(lexer) = lookup(&format!("{}DEFAULT_LEXER", ENV_PREFIX)) {
            if !lexer.trim().is_empty() {
                self.default_lexer = lexer.trim().to_string();
            }
        }
    }

    /// Reject values that would make the subsystem misbehave.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.slug_retries == 0 {
            return Err(AppError::Config(
                "slug_retries must be at least 1".to_string(),
            ));
        }
        if self.reap_interval_secs == 0 {
            return Err(AppError::Config(
                "reap_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.expiries.is_empty() {
            return Err(AppError::Config(
                "at least one expiry must be configured".to_string(),
            ));
        }
        self.ratelimit.validate()
    }

    /// Period between active expiry sweeps.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}
