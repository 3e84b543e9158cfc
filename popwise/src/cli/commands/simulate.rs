//! `simulate` command.
//!
//! Wires a simulated page, visitor state, and collaborators into an
//! orchestrator, boots it from the campaign source, and replays the page
//! script.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::SimulateArgs;
use crate::collab::{
    CampaignSource, FileCampaignSource, FrequencyRecorder, HttpCampaignSource,
    HttpFrequencyRecorder, LogPresenter, NoopRecorder,
};
use crate::error::PopwiseError;
use crate::observability::EventEmitter;
use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::page::{Page, SimulatedPage};
use crate::session::{FileStore, KeyValueStore, MemoryStore, SessionState};
use crate::simulation::{PageScript, run_script};

/// Run a scripted page visit.
///
/// # Errors
///
/// Returns a usage error if no campaign source is given, or the error of
/// whichever input (script, state file, campaign source) fails to load.
pub async fn run(args: &SimulateArgs, cancel: CancellationToken) -> Result<(), PopwiseError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let script = PageScript::load(&args.script)?;

    let store: Arc<dyn KeyValueStore> = match &args.state_file {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    let source: Box<dyn CampaignSource> = match (&args.campaigns, &args.source_url) {
        (Some(path), _) => Box::new(FileCampaignSource::new(path)),
        (None, Some(url)) => Box::new(HttpCampaignSource::new(url, args.http_timeout)?),
        (None, None) => {
            return Err(PopwiseError::Usage(
                "either --campaigns or --source-url is required".to_string(),
            ));
        }
    };

    let recorder: Arc<dyn FrequencyRecorder> = match &args.frequency_url {
        Some(url) => Arc::new(HttpFrequencyRecorder::new(url, args.http_timeout)?),
        None => Arc::new(NoopRecorder),
    };

    let events = Arc::new(match &args.events {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stdout(),
    });

    let sim = Arc::new(SimulatedPage::new(script.page.clone()));
    let presenter = Arc::new(LogPresenter::new());
    let orchestrator = Arc::new(Orchestrator::new(OrchestratorOptions {
        page: Page::new(sim.clone()),
        session: Arc::new(SessionState::open(store)),
        presenter: presenter.clone(),
        recorder,
        events: Arc::clone(&events),
        preview: args.preview.clone(),
    }));

    let selections = orchestrator.boot(source.as_ref()).await?;
    tracing::info!(
        selected = selections.len(),
        steps = script.steps.len(),
        end = ?script.end(),
        "replaying page script"
    );

    tokio::select! {
        () = run_script(&orchestrator, &sim, &presenter, &script) => {}
        () = cancel.cancelled() => {
            tracing::info!("simulation interrupted");
            orchestrator.cleanup();
            orchestrator.wait_idle().await;
        }
    }

    tracing::info!(
        dismissed = ?orchestrator.session().dismissed(),
        events = events.event_count(),
        "simulation finished"
    );
    Ok(())
}
