//! Logging initialization.
//!
//! Structured logging via `tracing` with human-readable and JSON output,
//! configurable verbosity, and an environment override via
//! `POPWISE_LOG_LEVEL`.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable overriding the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "POPWISE_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Maps a verbosity level to a tracing directive string.
///
/// Only the engine crates get louder with `-v`/`-vv`; dependencies such as
/// the HTTP client stay one level quieter.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,popwise=info,popwise_core=info",
        2 => "info,popwise=debug,popwise_core=debug",
        _ => "debug,popwise=trace,popwise_core=trace",
    }
}

/// Builds the filter, preferring `POPWISE_LOG_LEVEL` over `verbosity`.
fn build_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)))
}

/// Initializes the global tracing subscriber, writing to stderr.
///
/// JSON records carry their fields at the top level so campaign ids and
/// trigger kinds can be filtered without unwrapping a nested object.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = build_filter(verbosity);

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }

    #[test]
    fn test_quiet_by_default() {
        assert_eq!(verbosity_to_directive(0), "warn");
    }

    #[test]
    fn test_verbosity_raises_engine_targets_first() {
        assert!(verbosity_to_directive(1).starts_with("warn,"));
        assert!(verbosity_to_directive(1).contains("popwise=info"));
        assert!(verbosity_to_directive(2).contains("popwise=debug"));
        assert_eq!(verbosity_to_directive(3), verbosity_to_directive(u8::MAX));
        assert!(verbosity_to_directive(3).contains("popwise=trace"));
    }

    #[test]
    fn test_every_directive_parses() {
        for verbosity in 0..=3 {
            assert!(
                EnvFilter::try_new(verbosity_to_directive(verbosity)).is_ok(),
                "bad directive for -{verbosity}"
            );
        }
    }
}
