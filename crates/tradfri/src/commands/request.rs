//! One-shot `get`, `post`, and `put`.

use serde_json::Value;
use tradfri_coap::{CoapClient, Json, Method, RawText};

use crate::cli::{BodyArgs, GetArgs};
use crate::config::Target;
use crate::error::CliError;

pub async fn get(client: &CoapClient, target: &Target, args: &GetArgs) -> Result<(), CliError> {
    let uri = target.uri(&args.path);
    if args.raw {
        let body = client.exchange(Method::Get, &uri, None::<&()>, &RawText).await?;
        print_raw(&body);
    } else {
        let body = client
            .exchange(Method::Get, &uri, None::<&()>, &Json::<Value>::new())
            .await?;
        print_json(&body)?;
    }
    Ok(())
}

/// POST or PUT a pre-validated JSON body. Gateways usually answer with an
/// empty body; non-empty replies are printed.
pub async fn send(
    client: &CoapClient,
    target: &Target,
    method: Method,
    args: &BodyArgs,
    body: Option<Value>,
) -> Result<(), CliError> {
    let uri = target.uri(&args.path);
    let payload = body.unwrap_or(Value::Null);
    let reply = client.exchange(method, &uri, Some(&payload), &RawText).await?;
    print_reply(&reply, args.raw)
}

/// Print a response body, pretty-printing it when it parses as JSON.
pub(super) fn print_reply(body: &str, raw: bool) -> Result<(), CliError> {
    if body.trim().is_empty() {
        return Ok(());
    }
    if raw {
        print_raw(body);
        return Ok(());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => print_json(&value),
        Err(_) => {
            print_raw(body);
            Ok(())
        }
    }
}

fn print_raw(body: &str) {
    println!("{body}");
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
