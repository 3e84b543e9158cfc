//! `validate` command.
//!
//! Loads every file, reports errors and warnings, and fails if any file
//! is invalid (or, with `--strict`, has warnings).

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, PopwiseError};

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    campaigns: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate campaign files.
///
/// # Errors
///
/// Returns `ConfigError::ValidationFailed` if any file fails.
pub fn run(args: &ValidateArgs) -> Result<(), PopwiseError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| check(&loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let mark = if report.valid { "ok" } else { "FAILED" };
                println!(
                    "{}: {mark} ({} campaign(s), {} warning(s))",
                    report.file,
                    report.campaigns,
                    report.warnings.len()
                );
                for error in &report.errors {
                    println!("  error: {error}");
                }
                for warning in &report.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let count = reports.iter().filter(|r| !r.valid).count();
    if count > 0 {
        return Err(ConfigError::ValidationFailed { count }.into());
    }
    Ok(())
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    tracing::info!(file = %path.display(), "validating campaigns");
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(result) => {
            let warnings: Vec<String> = result.warnings.iter().map(ToString::to_string).collect();
            FileReport {
                file,
                valid: !(strict && !warnings.is_empty()),
                campaigns: result.campaigns.len(),
                errors: Vec::new(),
                warnings,
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => FileReport {
            file,
            valid: false,
            campaigns: 0,
            errors: errors
                .iter()
                .map(|issue| format!("{} at {}", issue.message, issue.path))
                .collect(),
            warnings: Vec::new(),
        },
        Err(e) => FileReport {
            file,
            valid: false,
            campaigns: 0,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}
