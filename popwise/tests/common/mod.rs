//! Shared helpers for `popwise` integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Runs the `popwise` binary.
pub struct PopwiseProcess;

impl PopwiseProcess {
    /// Runs `popwise` with `args` and waits for it to exit.
    pub fn run(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_popwise"))
            .args(args)
            .env_remove("POPWISE_STATE_FILE")
            .env_remove("POPWISE_PREVIEW")
            .env_remove("POPWISE_CAMPAIGNS")
            .env_remove("POPWISE_SOURCE_URL")
            .env("NO_COLOR", "1")
            .output()
            .expect("failed to run popwise")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Parses JSONL output into values.
    pub fn jsonl(output: &Output) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
            .collect()
    }

    /// Returns the events of one type.
    pub fn of_type<'a>(
        events: &'a [serde_json::Value],
        kind: &str,
    ) -> Vec<&'a serde_json::Value> {
        events.iter().filter(|e| e["type"] == kind).collect()
    }
}

/// Converts a path to `&str` for argument lists.
pub fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}
