//! Profile configuration for web IO modules.
//!
//! TOML profiles at the platform config path, layered with `WEBIO_`
//! environment overrides, and translation to `webio_core::ModuleConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use webio_core::{ModuleConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no profile selected and no default_profile configured")]
    NoProfile,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when the caller does not name one.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named module profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Values a profile falls back to when it leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Round-trip timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept self-signed certificates.
    #[serde(default = "default_true")]
    pub insecure: bool,

    #[serde(default = "default_true")]
    pub validate_addresses: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: true,
            validate_addresses: true,
        }
    }
}

fn default_timeout() -> u64 {
    webio_core::config::DEFAULT_TIMEOUT.as_secs()
}
fn default_true() -> bool {
    true
}

/// One IO module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Module URL (`https://192.168.100.20/`) or bare host.
    pub url: String,

    /// Custom CA certificate; takes precedence over `insecure`.
    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,

    pub timeout: Option<u64>,

    pub validate_addresses: Option<bool>,
}

impl Profile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ca_cert: None,
            insecure: None,
            timeout: None,
            validate_addresses: None,
        }
    }
}

impl Config {
    /// Resolve `profile` (or the default profile) into a runtime config.
    pub fn module_config(&self, profile: Option<&str>) -> Result<ModuleConfig, ConfigError> {
        let name = profile
            .or(self.default_profile.as_deref())
            .ok_or(ConfigError::NoProfile)?;
        let entry = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })?;
        profile_to_module_config(entry, &self.defaults)
    }
}

/// Build a `ModuleConfig` from one profile and the global defaults.
pub fn profile_to_module_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ModuleConfig, ConfigError> {
    let base = if profile.url.contains("://") {
        let url = profile
            .url
            .parse::<url::Url>()
            .map_err(|e| ConfigError::Validation {
                field: "url".into(),
                reason: format!("invalid URL {}: {e}", profile.url),
            })?;
        ModuleConfig::new(url)
    } else {
        ModuleConfig::for_host(&profile.url).map_err(|e| ConfigError::Validation {
            field: "url".into(),
            reason: e.to_string(),
        })?
    };

    let tls = if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if timeout.is_zero() {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least one second".into(),
        });
    }

    Ok(base
        .with_tls(tls)
        .with_timeout(timeout)
        .with_address_validation(
            profile
                .validate_addresses
                .unwrap_or(defaults.validate_addresses),
        ))
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "webio", "webio").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("webio");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus environment.
///
/// Nested keys use a double underscore:
/// `WEBIO_DEFAULTS__TIMEOUT=10`, `WEBIO_PROFILES__BENCH__URL=...`.
/// A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WEBIO_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
