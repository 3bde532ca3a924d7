//! Resolve the gateway target from the config file, the selected profile,
//! and CLI flag overrides.

use std::time::Duration;

use secrecy::SecretString;
use tradfri_coap::{ClientConfig, Credentials};
use tradfri_config::{Config, Profile, resolve_key};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything needed to reach one gateway, credentials excepted.
#[derive(Debug)]
pub struct Target {
    pub profile_name: String,
    /// The stored profile with flag overrides applied.
    pub profile: Profile,
    pub client: ClientConfig,
}

impl Target {
    pub fn gateway(&self) -> &str {
        &self.profile.gateway
    }

    /// Turn a resource path into a locator; full `coaps://` URIs pass through.
    pub fn uri(&self, path: &str) -> String {
        if path.starts_with("coaps://") {
            path.to_owned()
        } else {
            tradfri_coap::resource::uri_with_port(self.gateway(), self.client.port, path)
        }
    }
}

pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn resolve_target(global: &GlobalOpts, cfg: &Config) -> Result<Target, CliError> {
    let profile_name = active_profile_name(global, cfg);
    let mut profile = cfg.profiles.get(&profile_name).cloned().unwrap_or_default();

    if let Some(ref gateway) = global.gateway {
        profile.gateway.clone_from(gateway);
    }
    if global.identity.is_some() {
        profile.identity.clone_from(&global.identity);
    }
    if profile.gateway.trim().is_empty() {
        return Err(CliError::NoGateway {
            path: tradfri_config::config_path().display().to_string(),
        });
    }

    let mut client = tradfri_config::client_config(&profile, &cfg.defaults)?;
    if let Some(millis) = global.timeout {
        if millis == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }
        client.timeout = Duration::from_millis(millis);
    }

    Ok(Target {
        profile_name,
        profile,
        client,
    })
}

/// Identity and key: `--key` wins, then the profile's key chain.
pub fn resolve_credentials(target: &Target, global: &GlobalOpts) -> Result<Credentials, CliError> {
    let no_credentials = || CliError::NoCredentials {
        profile: target.profile_name.clone(),
    };

    let identity = target
        .profile
        .identity
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(no_credentials)?;

    let key = match global.key {
        Some(ref key) => SecretString::from(key.clone()),
        None => resolve_key(&target.profile, &target.profile_name)?,
    };

    Ok(Credentials::new(identity, key))
}
