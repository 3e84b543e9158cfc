//! Structured event stream.
//!
//! Discrete, typed events emitted while campaigns are selected, evaluated,
//! shown, and dismissed. Events are serialized as newline-delimited JSON
//! (JSONL) with a monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use popwise_core::config::{LogicOperator, Surface};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a page visit.
///
/// Serialized with a `"type"` tag so consumers can dispatch on the kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The selector picked its per-surface winners.
    CampaignsSelected {
        /// When selection finished.
        timestamp: DateTime<Utc>,
        /// Number of campaigns offered by the source.
        candidates: usize,
        /// Winning campaign ids in priority order.
        campaign_ids: Vec<String>,
        /// Surface of each winner, aligned with `campaign_ids`.
        surfaces: Vec<Surface>,
    },

    /// A campaign's trigger set resolved.
    TriggerFired {
        /// When the combinator resolved.
        timestamp: DateTime<Utc>,
        /// Campaign id.
        campaign_id: String,
        /// Combination operator.
        operator: LogicOperator,
        /// Combined result.
        result: bool,
        /// Time from evaluation start in milliseconds.
        elapsed_ms: u64,
    },

    /// A campaign was handed to the presenter.
    CampaignShown {
        /// When the campaign was presented.
        timestamp: DateTime<Utc>,
        /// Campaign id.
        campaign_id: String,
        /// Dismissal / frequency key.
        tracking_key: String,
        /// Display surface.
        surface: Surface,
        /// Shown through a preview link.
        preview: bool,
    },

    /// A campaign will not be shown on this page view.
    CampaignSuppressed {
        /// When the decision was made.
        timestamp: DateTime<Utc>,
        /// Campaign id.
        campaign_id: String,
        /// Why (e.g. `"triggers_unmet"`, `"session_rules"`, `"cancelled"`).
        reason: String,
    },

    /// The visitor closed a campaign.
    CampaignDismissed {
        /// When the close happened.
        timestamp: DateTime<Utc>,
        /// Campaign id.
        campaign_id: String,
        /// Key recorded in the dismissed set.
        tracking_key: String,
        /// `false` if the key was already dismissed or the campaign was a preview.
        recorded: bool,
    },

    /// Evaluation failed unexpectedly; the campaign is shown anyway.
    EvaluationFault {
        /// When the fault occurred.
        timestamp: DateTime<Utc>,
        /// Campaign id.
        campaign_id: String,
        /// Stage that failed (`"triggers"` or `"session_rules"`).
        stage: String,
        /// Error description.
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; the event stream never
/// interrupts campaign evaluation.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    ///
    /// Sequence numbers are assigned under the writer lock, so lines always
    /// appear in sequence order even when campaign tasks emit concurrently.
    pub fn emit(&self, event: Event) {
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            event,
        };
        match serde_json::to_string(&envelope) {
            Ok(line) => {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone, Default)]
    pub(crate) struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }

        pub(crate) fn events(&self) -> Vec<serde_json::Value> {
            self.contents()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::CampaignShown {
            timestamp: DateTime::parse_from_rfc3339("2026-03-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            campaign_id: "welcome".to_owned(),
            tracking_key: "exp-1".to_owned(),
            surface: Surface::Modal,
            preview: false,
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "CampaignShown");
        assert_eq!(parsed["surface"], "modal");
        assert_eq!(parsed["timestamp"], "2026-03-04T10:15:30Z");
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::CampaignDismissed {
            timestamp: Utc::now(),
            campaign_id: "welcome".to_owned(),
            tracking_key: "exp-1".to_owned(),
            recorded: true,
        });

        assert_eq!(emitter.event_count(), 2);

        let lines = tw.events();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["type"], "CampaignDismissed");
        assert!(lines[1].get("event").is_none());
    }

    #[test]
    fn all_event_variants_serialize() {
        let now = Utc::now();
        let variants = vec![
            Event::CampaignsSelected {
                timestamp: now,
                candidates: 4,
                campaign_ids: vec!["b".to_owned(), "bar".to_owned()],
                surfaces: vec![Surface::Modal, Surface::Banner],
            },
            Event::TriggerFired {
                timestamp: now,
                campaign_id: "b".to_owned(),
                operator: LogicOperator::Or,
                result: true,
                elapsed_ms: 3000,
            },
            Event::CampaignSuppressed {
                timestamp: now,
                campaign_id: "b".to_owned(),
                reason: "session_rules".to_owned(),
            },
            Event::EvaluationFault {
                timestamp: now,
                campaign_id: "b".to_owned(),
                stage: "triggers".to_owned(),
                error: "scroll_depth detector exited without a result".to_owned(),
            },
        ];

        for variant in &variants {
            let json = serde_json::to_string(variant).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(parsed.get("type").is_some(), "missing type tag: {json}");
            assert!(parsed.get("campaign_id").is_some() || parsed.get("campaign_ids").is_some());
        }
    }

    #[test]
    fn noop_emitter_counts_events() {
        let emitter = EventEmitter::noop();
        emitter.emit(sample_event());
        assert_eq!(emitter.event_count(), 1);
    }
}
