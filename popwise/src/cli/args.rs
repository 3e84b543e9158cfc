//! CLI argument definitions
//!
//! All Clap derive structs for `popwise` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Trigger evaluation and campaign selection for storefront popups.
#[derive(Parser, Debug)]
#[command(name = "popwise", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "POPWISE_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "POPWISE_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scripted page visit against a campaign set.
    Simulate(SimulateArgs),

    /// Validate campaign files.
    Validate(ValidateArgs),

    /// Inspect or reset persisted visitor state.
    Session(SessionCommand),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Simulate
// ============================================================================

/// Arguments for `simulate`.
#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("source").required(true).multiple(false))]
pub struct SimulateArgs {
    /// Campaign file (YAML or JSON).
    #[arg(short, long, group = "source", env = "POPWISE_CAMPAIGNS")]
    pub campaigns: Option<PathBuf>,

    /// Campaign backend base URL; campaigns come from `GET {url}/campaigns/active`.
    #[arg(long, group = "source", env = "POPWISE_SOURCE_URL")]
    pub source_url: Option<String>,

    /// Page script (YAML).
    #[arg(short, long)]
    pub script: PathBuf,

    /// Visitor state file; state is kept in memory when omitted.
    #[arg(long, env = "POPWISE_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Campaign id to preview, bypassing triggers and dismissals.
    #[arg(long, env = "POPWISE_PREVIEW")]
    pub preview: Option<String>,

    /// Write the JSONL event stream to a file instead of stdout.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Record impressions with `POST {url}/frequency`.
    #[arg(long, env = "POPWISE_FREQUENCY_URL")]
    pub frequency_url: Option<String>,

    /// HTTP timeout for backend requests.
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub http_timeout: std::time::Duration,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "POPWISE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Validate
// ============================================================================

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Campaign files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Session
// ============================================================================

/// Visitor state commands.
#[derive(Args, Debug)]
pub struct SessionCommand {
    /// Session subcommand.
    #[command(subcommand)]
    pub subcommand: SessionSubcommand,
}

/// Visitor state subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionSubcommand {
    /// Print visitor ids, visit count, and dismissed campaigns.
    Show(SessionArgs),

    /// Forget every dismissed campaign.
    Clear(SessionArgs),
}

/// Arguments shared by `session` subcommands.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Visitor state file.
    #[arg(long, env = "POPWISE_STATE_FILE")]
    pub state_file: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
