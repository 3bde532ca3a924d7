//! Command dispatch: bridges CLI args to the CoAP client.

pub mod observe;
pub mod register;
pub mod request;

use tradfri_coap::{CoapClient, Credentials, DtlsConnector, Method, StaticGateway};

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, Target};
use crate::error::CliError;

/// Connect with the resolved credentials and run a gateway-bound command.
pub async fn dispatch(cmd: Command, target: &Target, global: &GlobalOpts) -> Result<(), CliError> {
    if let Command::Register(args) = cmd {
        return register::handle(args, target).await;
    }

    // Validate the body before any handshake happens.
    let body = match cmd {
        Command::Post(ref args) | Command::Put(ref args) => {
            Some(serde_json::from_str::<serde_json::Value>(&args.body)?)
        }
        _ => None,
    };

    let credentials = config::resolve_credentials(target, global)?;
    let client = connect(target, credentials).await?;

    let result = match cmd {
        Command::Get(args) => request::get(&client, target, &args).await,
        Command::Post(args) => request::send(&client, target, Method::Post, &args, body).await,
        Command::Put(args) => request::send(&client, target, Method::Put, &args, body).await,
        Command::Observe(args) => observe::handle(&client, target, &args).await,
        // Register and Completions are handled before dispatch
        Command::Register(_) | Command::Completions(_) => unreachable!(),
    };

    client.close().await;
    result
}

/// Bring up the secured endpoint, bounded by the request timeout.
pub async fn connect(
    target: &Target,
    credentials: Credentials,
) -> Result<CoapClient, CliError> {
    let client = CoapClient::with_config(
        DtlsConnector,
        StaticGateway::new(target.gateway()),
        &target.client,
    );

    tracing::debug!(gateway = target.gateway(), identity = credentials.identity(), "connecting");
    client.try_set_credentials(credentials).await?;

    Ok(client)
}
