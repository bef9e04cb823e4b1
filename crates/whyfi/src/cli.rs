//! Clap derive structures for the `whyfi` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// whyfi -- why is my Wi-Fi slow?
#[derive(Debug, Parser)]
#[command(
    name = "whyfi",
    version,
    about = "Diagnose Wi-Fi and network health from the command line",
    long_about = "Runs speed tests, scores channel interference and asks an AI model\n\
        for a structured health report built from recorded telemetry.\n\n\
        Telemetry comes from JSON recordings produced by a host collector.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "WHYFI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WHYFI_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds, 0 for none (overrides config)
    #[arg(long, env = "WHYFI_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Measure download, upload, latency and jitter
    #[command(alias = "speed", alias = "st")]
    Speedtest,

    /// Ask the AI model for a health report on recorded telemetry
    #[command(alias = "diag")]
    Diagnose(DiagnoseArgs),

    /// Score channel congestion from a nearby-network scan
    #[command(alias = "int")]
    Interference(InterferenceArgs),

    /// Replay recorded telemetry through the poller and classify each reading
    Watch(WatchArgs),

    /// Manage the completion API key
    Key(KeyArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

// ── Task arguments ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiagnoseArgs {
    /// JSON file with recorded snapshots, oldest first
    #[arg(long, short = 's')]
    pub snapshots: PathBuf,

    /// Nearby-network scan to include as interference analysis
    #[arg(long)]
    pub scan: Option<PathBuf>,

    /// Run a speed test first and include its result
    #[arg(long)]
    pub speedtest: bool,
}

#[derive(Debug, Args)]
pub struct InterferenceArgs {
    /// JSON file with the current link and the nearby networks
    #[arg(long)]
    pub scan: PathBuf,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// JSON file with recorded snapshots, oldest first
    #[arg(long, short = 's')]
    pub snapshots: PathBuf,

    /// Poll interval in milliseconds (overrides config)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many polls (defaults to the recording length)
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

// ── Key ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Store an API key (prompts when --key is omitted)
    Set {
        /// The key itself. Prefer the prompt so it stays out of shell history.
        #[arg(long)]
        key: Option<String>,

        /// Save to the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },

    /// Remove the stored API key
    Clear,

    /// Show whether a key is configured and where it comes from
    Status,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
