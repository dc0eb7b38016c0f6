//! Clap derive structures for the `stalink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// stalink -- command-line client for OGC SensorThings services
#[derive(Debug, Parser)]
#[command(
    name = "stalink",
    version,
    about = "Query and manage OGC SensorThings services from the command line",
    long_about = "Reads, creates and deletes SensorThings entities over REST and\n\
        watches entity updates over MQTT.\n\n\
        Resources are addressed by path, e.g. `Things`, `Things(1)`,\n\
        `Things(1)/Datastreams` or `Observations(7)/Datastream`.",
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
    /// Service root URL (overrides the config file)
    #[arg(long, short = 'e', env = "STALINK_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// MQTT broker host, needed by `watch`
    #[arg(long, env = "STALINK_MQTT_HOST", global = true)]
    pub mqtt_host: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one id per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one entity, e.g. `Things(1)` or `Observations(7)/Datastream`
    Get(GetArgs),

    /// List a collection, e.g. `Things` or `Things(1)/Datastreams`
    #[command(alias = "ls")]
    List(ListArgs),

    /// Create an entity in a collection from JSON
    Create(CreateArgs),

    /// Delete an entity
    #[command(alias = "rm")]
    Delete(DeleteArgs),

    /// Print entities published on a collection or entity topic
    Watch(WatchArgs),

    /// Inspect or initialise the config file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Entity path
    pub path: String,

    /// Navigation property to expand inline (repeatable)
    #[arg(long, short = 'x')]
    pub expand: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Collection path
    pub path: String,

    /// OData filter, e.g. "result gt 20"
    #[arg(long, short = 'f')]
    pub filter: Option<String>,

    /// Properties to return (comma-separated)
    #[arg(long, short = 's', value_delimiter = ',')]
    pub select: Vec<String>,

    /// Navigation property to expand inline (repeatable)
    #[arg(long, short = 'x')]
    pub expand: Vec<String>,

    /// Sort clause, e.g. "phenomenonTime desc" (repeatable)
    #[arg(long)]
    pub order_by: Vec<String>,

    /// Page size
    #[arg(long, short = 'n')]
    pub top: Option<u32>,

    #[arg(long)]
    pub skip: Option<u32>,

    /// Ask the server for the total count
    #[arg(long)]
    pub count: bool,

    /// Follow next links and fetch every page
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Collection path
    pub path: String,

    /// Entity as inline JSON
    #[arg(long, short = 'd', conflicts_with = "from_file", required_unless_present = "from_file")]
    pub data: Option<String>,

    /// Read the entity JSON from a file
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,

    /// Publish over MQTT instead of POSTing
    #[arg(long)]
    pub mqtt: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Entity path
    pub path: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Collection or entity path
    pub path: String,

    /// Restrict messages to these properties (comma-separated)
    #[arg(long, short = 's', value_delimiter = ',')]
    pub select: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration
    Show,

    /// Write a config file
    Init {
        /// Service root URL
        #[arg(long)]
        endpoint: String,

        /// MQTT broker host
        #[arg(long)]
        mqtt_host: Option<String>,

        /// MQTT broker port
        #[arg(long)]
        mqtt_port: Option<u16>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
