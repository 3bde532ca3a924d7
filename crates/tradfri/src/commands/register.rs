//! Pair with the gateway and persist the issued key.

use secrecy::ExposeSecret;
use tradfri_coap::{Credentials, register_identity};
use tradfri_config::{load_config_or_default, save_config, store_key};

use crate::cli::RegisterArgs;
use crate::config::Target;
use crate::error::CliError;

pub async fn handle(args: RegisterArgs, target: &Target) -> Result<(), CliError> {
    let identity = target
        .profile
        .identity
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CliError::Validation {
            field: "identity".into(),
            reason: "pass --identity to name the identity to register".into(),
        })?;

    let client = super::connect(target, Credentials::for_pairing(args.security_code)).await?;
    let registration = register_identity(&client, target.gateway(), &identity).await;
    client.close().await;
    let registration = registration?;

    let mut profile = target.profile.clone();
    profile.identity = Some(identity.clone());
    if args.plaintext {
        profile.key = Some(registration.credentials.key().expose_secret().to_owned());
    } else {
        store_key(&target.profile_name, registration.credentials.key())?;
        profile.key = None;
    }

    let mut cfg = load_config_or_default();
    cfg.profiles.insert(target.profile_name.clone(), profile);
    save_config(&cfg)?;

    eprintln!(
        "Registered '{identity}' for profile '{}'{}",
        target.profile_name,
        registration
            .firmware
            .map(|fw| format!(" (gateway firmware {fw})"))
            .unwrap_or_default()
    );
    Ok(())
}
