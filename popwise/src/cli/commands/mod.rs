//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod session;
pub mod simulate;
pub mod validate;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, SessionSubcommand};
use crate::error::PopwiseError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), PopwiseError> {
    match cli.command {
        Commands::Simulate(args) => simulate::run(&args, cancel).await,
        Commands::Validate(args) => validate::run(&args),
        Commands::Session(cmd) => match cmd.subcommand {
            SessionSubcommand::Show(args) => session::show(&args),
            SessionSubcommand::Clear(args) => session::clear(&args),
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
