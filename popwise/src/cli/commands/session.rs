//! `session` commands.

use crate::cli::args::{OutputFormat, SessionArgs};
use crate::error::PopwiseError;
use crate::session::{self, FileStore, SessionSummary};

/// Print the persisted visitor state.
///
/// # Errors
///
/// Returns a store error if the state file is unreadable or corrupt.
pub fn show(args: &SessionArgs) -> Result<(), PopwiseError> {
    let store = FileStore::open(&args.state_file)?;
    let summary = SessionSummary::read(&store)?;

    match args.format {
        OutputFormat::Human => {
            println!("visitor:   {}", summary.visitor_id.as_deref().unwrap_or("-"));
            println!("session:   {}", summary.session_id.as_deref().unwrap_or("-"));
            println!("visits:    {}", summary.visit_count);
            if summary.dismissed.is_empty() {
                println!("dismissed: -");
            } else {
                let keys: Vec<&str> = summary.dismissed.iter().map(String::as_str).collect();
                println!("dismissed: {}", keys.join(", "));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Forget every dismissed campaign.
///
/// # Errors
///
/// Returns a store error if the state file cannot be read or written.
pub fn clear(args: &SessionArgs) -> Result<(), PopwiseError> {
    let store = FileStore::open(&args.state_file)?;
    let before = SessionSummary::read(&store)?.dismissed.len();
    session::clear_dismissed(&store)?;

    match args.format {
        OutputFormat::Human => println!("cleared {before} dismissed campaign(s)"),
        OutputFormat::Json => println!("{}", serde_json::json!({ "cleared": before })),
    }
    Ok(())
}
