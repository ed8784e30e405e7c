use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "confseed")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Idempotent Confluence Cloud provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Site credentials. Only commands that talk to the site require them.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Site URL, e.g. https://acme.atlassian.net
    #[arg(long, env = "CONFLUENCE_URL", global = true)]
    pub url: Option<String>,

    /// Account email
    #[arg(long, env = "CONFLUENCE_EMAIL", global = true)]
    pub email: Option<String>,

    /// API token
    #[arg(long, env = "CONFLUENCE_API_TOKEN", global = true, hide_env_values = true)]
    pub api_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the site onto the policy
    Provision(ProvisionArgs),

    /// Show the requests a provision run would send, without sending them
    Plan(SourceArgs),

    /// Work with the user account mapping
    #[command(subcommand)]
    Mapping(MappingCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Policy file (TOML); the built-in policy when omitted
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// User account mapping (JSON)
    #[arg(long, default_value = "user_account_mapping.json")]
    pub mapping: PathBuf,
}

#[derive(Args)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Do not pause between requests
    #[arg(long)]
    pub no_pause: bool,

    /// Exit non-zero when any step failed
    #[arg(long)]
    pub strict: bool,
}

#[derive(Subcommand)]
pub enum MappingCommand {
    /// Print a mapping skeleton for the policy users
    Template {
        /// Policy file (TOML); the built-in policy when omitted
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Show which policy users the mapping resolves
    Check(SourceArgs),
}
