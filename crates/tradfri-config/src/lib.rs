//! Shared configuration for tradfri tools.
//!
//! TOML gateway profiles, pre-shared key resolution (env + keyring +
//! plaintext), and translation to `tradfri_coap` client settings. The CLI
//! layers its flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradfri_coap::{ClientConfig, Credentials, SECURE_PORT};

/// Keyring service under which pre-shared keys are stored.
pub const KEYRING_SERVICE: &str = "tradfri";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no pre-shared key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, falling back to the default profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    20_000
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway host name or IP address.
    pub gateway: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// PSK identity registered with the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Pre-shared key in plaintext; prefer the keyring or `key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Environment variable holding the pre-shared key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,

    /// Override the default timeout (milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tradfri", "tradfri").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("tradfri");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from the canonical file plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` plus `TRADFRI_`-prefixed environment variables.
///
/// Nested keys use a double underscore, e.g. `TRADFRI_DEFAULTS__TIMEOUT_MS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TRADFRI_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if it is missing or unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
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

// ── Key resolution ──────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/psk"))
}

/// Resolve a profile's pre-shared key: `key_env`, then the system
/// keyring, then the plaintext `key` field.
pub fn resolve_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    if let Some(ref key) = profile.key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Save a pre-shared key in the system keyring for `profile_name`.
pub fn store_key(profile_name: &str, key: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(key.expose_secret())?;
    Ok(())
}

// ── Translation to client settings ──────────────────────────────────

/// Build the credential pair for a profile.
pub fn profile_to_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let identity = profile
        .identity
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let key = resolve_key(profile, profile_name)?;
    Ok(Credentials::new(identity, key))
}

/// Client settings for a profile, with `defaults` filling the gaps.
pub fn client_config(profile: &Profile, defaults: &Defaults) -> Result<ClientConfig, ConfigError> {
    if profile.gateway.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "gateway".into(),
            reason: "must name a host or IP address".into(),
        });
    }

    let timeout_ms = profile.timeout_ms.unwrap_or(defaults.timeout_ms);
    if timeout_ms == 0 {
        return Err(ConfigError::Validation {
            field: "timeout_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(ClientConfig {
        port: profile.port.unwrap_or(SECURE_PORT),
        timeout: Duration::from_millis(timeout_ms),
        ..ClientConfig::default()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout_ms, 20_000);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
default_profile = "home"

[defaults]
timeout_ms = 5000

[profiles.home]
gateway = "192.168.1.20"
identity = "kitchen-pi"
key_env = "HOME_GATEWAY_PSK"

[profiles.lab]
gateway = "10.0.0.9"
port = 15684
timeout_ms = 250
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        let (name, home) = cfg.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(home.gateway, "192.168.1.20");
        assert_eq!(home.identity.as_deref(), Some("kitchen-pi"));

        let client = client_config(home, &cfg.defaults).unwrap();
        assert_eq!(client.port, SECURE_PORT);
        assert_eq!(client.timeout, Duration::from_secs(5));

        let (_, lab) = cfg.profile(Some("lab")).unwrap();
        let client = client_config(lab, &cfg.defaults).unwrap();
        assert_eq!(client.port, 15684);
        assert_eq!(client.timeout, Duration::from_millis(250));

        assert!(matches!(
            cfg.profile(Some("attic")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                gateway: "gw.local".into(),
                identity: Some("pi".into()),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[profiles.default]"));
        assert!(!written.contains("key_env"));

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["default"].gateway, "gw.local");
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        let defaults = Defaults::default();
        let blank = Profile::default();
        assert!(matches!(
            client_config(&blank, &defaults),
            Err(ConfigError::Validation { .. })
        ));

        let zero = Profile {
            gateway: "gw".into(),
            timeout_ms: Some(0),
            ..Profile::default()
        };
        assert!(matches!(
            client_config(&zero, &defaults),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn unset_key_env_falls_back_to_plaintext() {
        let profile = Profile {
            gateway: "gw".into(),
            identity: Some("pi".into()),
            key: Some("from-file".into()),
            key_env: Some("TRADFRI_CONFIG_TEST_NEVER_SET".into()),
            ..Profile::default()
        };
        let creds = profile_to_credentials(&profile, "config-test-fallback").unwrap();
        assert_eq!(creds.identity(), "pi");
        assert_eq!(creds.key().expose_secret(), "from-file");
    }

    #[test]
    fn missing_identity_is_no_credentials() {
        let profile = Profile {
            gateway: "gw".into(),
            key: Some("k".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_credentials(&profile, "anon"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }
}
