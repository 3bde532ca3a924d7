//! Clap derive structures for the `tradfri` CLI.

use clap::{Args, Parser, Subcommand};

/// tradfri -- talk to an IKEA TRÅDFRI gateway over secure CoAP
#[derive(Debug, Parser)]
#[command(
    name = "tradfri",
    version,
    about = "Query and control an IKEA TRÅDFRI gateway over CoAP/DTLS",
    long_about = "Issues GET/POST/PUT requests and observe subscriptions against a\n\
        TRÅDFRI gateway, authenticating with a DTLS pre-shared key.\n\n\
        Paths are gateway resource paths (e.g. 15001/65537) or full coaps:// URIs.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "TRADFRI_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway host or IP address (overrides profile)
    #[arg(long, short = 'g', env = "TRADFRI_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// PSK identity (overrides profile)
    #[arg(long, env = "TRADFRI_IDENTITY", global = true)]
    pub identity: Option<String>,

    /// Pre-shared key (overrides profile and keyring)
    #[arg(long, env = "TRADFRI_KEY", global = true, hide_env_values = true)]
    pub key: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, short = 't', env = "TRADFRI_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a resource
    Get(GetArgs),

    /// Send a JSON body with POST
    Post(BodyArgs),

    /// Send a JSON body with PUT
    Put(BodyArgs),

    /// Stream notifications for a resource
    #[command(alias = "watch")]
    Observe(ObserveArgs),

    /// Pair with the gateway using its security code
    ///
    /// Registers the global `--identity` (or the profile's) and saves the
    /// issued key for the selected profile.
    Register(RegisterArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Resource path or coaps:// URI
    pub path: String,

    /// Print the body as received instead of pretty JSON
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct BodyArgs {
    /// Resource path or coaps:// URI
    pub path: String,

    /// JSON request body
    pub body: String,

    /// Print the response body as received instead of pretty JSON
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct ObserveArgs {
    /// Resource path or coaps:// URI
    pub path: String,

    /// Stop after this many notifications
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Print bodies as received instead of pretty JSON
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Security code printed on the bottom of the gateway
    #[arg(long, short = 'c', env = "TRADFRI_SECURITY_CODE", hide_env_values = true)]
    pub security_code: String,

    /// Store the issued key in the config file instead of the system keyring
    #[arg(long)]
    pub plaintext: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
