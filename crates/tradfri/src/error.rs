//! CLI error types with miette diagnostics.
//!
//! Maps transport and config errors into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use tradfri_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the gateway")]
    #[diagnostic(
        code(tradfri::connection_failed),
        help("Check that the gateway is powered on and reachable on UDP port 5684.")
    )]
    ConnectionFailed {
        #[source]
        source: tradfri_coap::Error,
    },

    #[error("No gateway configured")]
    #[diagnostic(
        code(tradfri::no_gateway),
        help(
            "Pass --gateway <host>, set TRADFRI_GATEWAY, or add a profile to\n\
             {path}"
        )
    )]
    NoGateway { path: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("DTLS handshake rejected: {reason}")]
    #[diagnostic(
        code(tradfri::auth_failed),
        help(
            "Verify the identity and pre-shared key.\n\
             Pair again with: tradfri register --security-code <code> --identity <id>"
        )
    )]
    AuthFailed { reason: String },

    #[error("No identity or pre-shared key configured for profile '{profile}'")]
    #[diagnostic(
        code(tradfri::no_credentials),
        help(
            "Pair with: tradfri register --security-code <code> --identity <id>\n\
             Or set TRADFRI_IDENTITY and TRADFRI_KEY."
        )
    )]
    NoCredentials { profile: String },

    // ── Responses ────────────────────────────────────────────────────
    #[error("Response is not valid JSON: {message}")]
    #[diagnostic(code(tradfri::decode), help("Use --raw to print the body as received."))]
    Decode { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tradfri::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid JSON body: {0}")]
    #[diagnostic(code(tradfri::json), help("Quote the body for your shell, e.g. '{{\"5850\": 1}}'."))]
    Json(#[from] serde_json::Error),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {millis}ms")]
    #[diagnostic(
        code(tradfri::timeout),
        help("Increase the timeout with --timeout or check the gateway's responsiveness.")
    )]
    Timeout { millis: u64 },

    // ── Configuration / IO ───────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(tradfri::config))]
    Config(ConfigError),

    #[error(transparent)]
    #[diagnostic(code(tradfri::coap))]
    Coap(tradfri_coap::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoGateway { .. } | Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── tradfri_coap::Error → CliError ───────────────────────────────────

impl From<tradfri_coap::Error> for CliError {
    fn from(err: tradfri_coap::Error) -> Self {
        use tradfri_coap::Error;

        match err {
            Error::Timeout { timeout_ms } => Self::Timeout { millis: timeout_ms },
            Error::Handshake(reason) => Self::AuthFailed { reason },
            Error::Decode { message, .. } => Self::Decode { message },
            Error::InvalidUri(e) => Self::Validation {
                field: "path".into(),
                reason: e.to_string(),
            },
            Error::Resolve { .. }
            | Error::Socket(_)
            | Error::Send(_)
            | Error::Interrupted
            | Error::NoTransport => Self::ConnectionFailed { source: err },
            other => Self::Coap(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
