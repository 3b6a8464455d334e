//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod config;
pub mod simulate;
pub mod version;

use crate::cli::args::{Cli, Commands, ConfigSubcommand};
use crate::error::CipherHuntError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), CipherHuntError> {
    match cli.command {
        Commands::Simulate(args) => simulate::run(&args, cli.quiet).await,
        Commands::Config(cmd) => match cmd.subcommand {
            ConfigSubcommand::Validate(args) => config::validate(&args),
            ConfigSubcommand::Show(args) => config::show(&args),
        },
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
