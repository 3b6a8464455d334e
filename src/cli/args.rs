//! CLI argument definitions
//!
//! All Clap derive structs for `cipherhunt` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Session engine for a social-deduction match.
#[derive(Parser, Debug)]
#[command(name = "cipherhunt", author, version, about)]
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
    #[arg(long, default_value = "auto", global = true, env = "CIPHERHUNT_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(
        long,
        default_value = "human",
        global = true,
        env = "CIPHERHUNT_LOG_FORMAT"
    )]
    pub log_format: LogFormatArg,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a seeded match between bots and print its events.
    Simulate(SimulateArgs),

    /// Inspect and validate game configuration files.
    Config(ConfigCommand),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

// ============================================================================
// Simulate Command
// ============================================================================

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to YAML game configuration (built-in defaults if omitted).
    #[arg(short, long, env = "CIPHERHUNT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for roles, secrets, masks and bot decisions.
    #[arg(short, long, default_value_t = 7, env = "CIPHERHUNT_SEED")]
    pub seed: u64,

    /// Number of players in the lobby.
    #[arg(
        short,
        long,
        default_value_t = 6,
        value_parser = clap::value_parser!(u16).range(2..=64)
    )]
    pub players: u16,

    /// Stop after this many rounds if nobody has won.
    #[arg(long, default_value_t = 20)]
    pub max_rounds: u32,

    /// Write JSONL events to this file instead of stdout.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Do not print events at all.
    #[arg(long, conflicts_with = "events")]
    pub no_events: bool,

    /// Summary format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Expose Prometheus metrics on this port while the match runs.
    #[arg(long, env = "CIPHERHUNT_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Config Command
// ============================================================================

/// Configuration commands.
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// Config subcommand.
    #[command(subcommand)]
    pub subcommand: ConfigSubcommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Validate configuration files.
    Validate(ConfigValidateArgs),

    /// Print the effective configuration.
    Show(ConfigShowArgs),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
pub struct ConfigValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `config show`.
#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Configuration file; the built-in defaults are shown if omitted.
    pub file: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "yaml")]
    pub format: DocumentFormat,
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

/// Log format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines.
    #[default]
    Human,
    /// Newline-delimited JSON.
    Json,
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

/// Serialization format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DocumentFormat {
    #[default]
    Yaml,
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
