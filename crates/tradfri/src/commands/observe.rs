//! Stream observe notifications until `--count` is reached or Ctrl-C.

use tokio::sync::mpsc;
use tradfri_coap::CoapClient;

use super::request::print_reply;
use crate::cli::ObserveArgs;
use crate::config::Target;
use crate::error::CliError;

pub async fn handle(client: &CoapClient, target: &Target, args: &ObserveArgs) -> Result<(), CliError> {
    let uri = target.uri(&args.path);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = client
        .observe(&uri, move |response| {
            let _ = tx.send(response.payload_string());
        })
        .await?;

    let mut seen = 0usize;
    let outcome = loop {
        tokio::select! {
            body = rx.recv() => {
                let Some(body) = body else {
                    tracing::info!(uri = %uri, "gateway ended the observation");
                    break Ok(());
                };
                if let Err(e) = print_reply(&body, args.raw) {
                    break Err(e);
                }
                seen += 1;
                if args.count.is_some_and(|count| seen >= count) {
                    break Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    subscription.cancel();
    tracing::debug!(uri = %uri, notifications = seen, "observation finished");
    outcome
}
