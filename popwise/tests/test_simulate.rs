//! End-to-end tests for `popwise simulate`.
//!
//! These run the binary in real time against the storefront fixture, so the
//! script keeps its steps a few hundred milliseconds apart.

mod common;

use std::path::Path;

use common::{PopwiseProcess, arg};
use serde_json::Value;

fn simulate(state: &Path, extra: &[&str]) -> Vec<Value> {
    let campaigns = PopwiseProcess::fixture_path("storefront.yaml");
    let script = PopwiseProcess::fixture_path("visit.yaml");
    let mut args = vec![
        "simulate",
        "--campaigns",
        arg(&campaigns),
        "--script",
        arg(&script),
        "--state-file",
        arg(state),
    ];
    args.extend_from_slice(extra);

    let output = PopwiseProcess::run(&args);
    assert!(
        output.status.success(),
        "simulate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    PopwiseProcess::jsonl(&output)
}

fn campaign_ids<'a>(events: &'a [Value], kind: &str) -> Vec<&'a str> {
    PopwiseProcess::of_type(events, kind)
        .into_iter()
        .filter_map(|e| e["campaign_id"].as_str())
        .collect()
}

#[test]
fn test_simulate_first_visit() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("visitor.json");
    let events = simulate(&state, &[]);

    let selected = PopwiseProcess::of_type(&events, "CampaignsSelected");
    assert_eq!(selected.len(), 1);
    assert_eq!(
        selected[0]["campaign_ids"],
        serde_json::json!(["welcome", "free-ship", "recent-buys"])
    );
    assert_eq!(
        selected[0]["surfaces"],
        serde_json::json!(["modal", "banner", "notification"])
    );

    let mut shown = campaign_ids(&events, "CampaignShown");
    shown.sort_unstable();
    assert_eq!(shown, vec!["free-ship", "recent-buys", "welcome"]);
    assert_eq!(campaign_ids(&events, "CampaignDismissed"), vec!["welcome"]);

    // Envelope sequence numbers are contiguous from zero
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], index);
    }
}

#[test]
fn test_dismissal_persists_across_visits() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("visitor.json");
    simulate(&state, &[]);

    let output = PopwiseProcess::run(&[
        "session",
        "show",
        "--state-file",
        arg(&state),
        "--format",
        "json",
    ]);
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["visit_count"], 1);
    assert_eq!(summary["dismissed"], serde_json::json!(["welcome"]));
    assert!(summary["visitor_id"].is_string());

    // Second visit: the modal goes to the next campaign in line, whose
    // exit-intent trigger never fires before the page closes
    let events = simulate(&state, &[]);
    let selected = PopwiseProcess::of_type(&events, "CampaignsSelected");
    assert_eq!(
        selected[0]["campaign_ids"],
        serde_json::json!(["exit-save", "free-ship", "recent-buys"])
    );
    let suppressed = PopwiseProcess::of_type(&events, "CampaignSuppressed");
    assert_eq!(suppressed.len(), 1);
    assert_eq!(suppressed[0]["campaign_id"], "exit-save");
    assert_eq!(suppressed[0]["reason"], "cancelled");

    let output = PopwiseProcess::run(&["session", "clear", "--state-file", arg(&state)]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cleared 1 dismissed campaign(s)"));

    let events = simulate(&state, &[]);
    let selected = PopwiseProcess::of_type(&events, "CampaignsSelected");
    assert_eq!(selected[0]["campaign_ids"][0], "welcome");
}

#[test]
fn test_preview_shows_only_the_previewed_campaign() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("visitor.json");
    let events = simulate(&state, &["--preview", "exit-save"]);

    assert_eq!(campaign_ids(&events, "CampaignShown"), vec!["exit-save"]);
    let shown = PopwiseProcess::of_type(&events, "CampaignShown");
    assert_eq!(shown[0]["preview"], true);
}

#[test]
fn test_unknown_preview_falls_back_to_selection() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("visitor.json");
    let events = simulate(&state, &["--preview", "no-such-campaign"]);

    let selected = PopwiseProcess::of_type(&events, "CampaignsSelected");
    assert_eq!(selected[0]["campaign_ids"][0], "welcome");
}

#[test]
fn test_events_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("visitor.json");
    let events_path = dir.path().join("events.jsonl");
    let stdout_events = simulate(&state, &["--events", arg(&events_path)]);
    assert!(stdout_events.is_empty());

    let content = std::fs::read_to_string(&events_path).unwrap();
    let events: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(!PopwiseProcess::of_type(&events, "CampaignShown").is_empty());
}

#[test]
fn test_unreachable_campaign_backend() {
    let script = PopwiseProcess::fixture_path("visit.yaml");
    let output = PopwiseProcess::run(&[
        "simulate",
        "--source-url",
        "http://127.0.0.1:9",
        "--script",
        arg(&script),
        "--http-timeout",
        "2s",
    ]);
    assert_eq!(output.status.code(), Some(4));
    assert!(PopwiseProcess::jsonl(&output).is_empty());
}
