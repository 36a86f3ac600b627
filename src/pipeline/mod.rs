//! Poll -> fetch -> download orchestration for one meeting
//!
//! Each claimed task runs this pipeline independently; there is no shared
//! mutable state between meetings beyond the stores. Provider failures are
//! translated into task-state transitions here and never propagate back
//! into the queue loop.

use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::observability::Metrics;
use crate::poller::{MeetingStatusPoller, PollOutcome, PollPolicy};
use crate::provider::MeetingProvider;
use crate::queue::TaskStore;
use crate::recordings::{CollectOutcome, FetchPolicy, RecordingFetcher, RecordingStore};
use crate::storage::StorageClient;

/// Everything one pipeline run needs, wired once at startup
pub struct PipelineDeps {
    pub provider: Arc<dyn MeetingProvider>,
    pub clock: Arc<dyn Clock>,
    pub tasks: Arc<TaskStore>,
    pub recordings: Arc<RecordingStore>,
    pub storage: Arc<StorageClient>,
    pub poll_policy: PollPolicy,
    pub fetch_policy: FetchPolicy,
    pub metrics: Arc<Metrics>,
}

/// Run the full pipeline for one meeting. Terminal task states are
/// written to the task record by the steps themselves; this function only
/// reports, it never returns an error to the caller.
pub async fn run_download_pipeline(deps: Arc<PipelineDeps>, email: String, meeting_id: String) {
    let poller = MeetingStatusPoller::new(
        deps.provider.clone(),
        deps.clock.clone(),
        deps.poll_policy.clone(),
        deps.metrics.clone(),
    );

    match poller.poll_until_terminal(&email, &meeting_id).await {
        PollOutcome::EndedOrWaiting => {}
        PollOutcome::NotFound => {
            // Task stays in-progress; staleness reclaim hands it back
            warn!(meeting_id, email, "Meeting status never became available");
            return;
        }
        PollOutcome::GaveUpOngoing => {
            warn!(meeting_id, email, "Meeting still ongoing after poll ceiling");
            return;
        }
    }

    let fetcher = RecordingFetcher::new(
        deps.provider.clone(),
        deps.clock.clone(),
        deps.recordings.clone(),
        deps.tasks.clone(),
        deps.storage.clone(),
        deps.fetch_policy.clone(),
        deps.metrics.clone(),
    );

    match fetcher.collect_all(&email, &meeting_id).await {
        Ok(CollectOutcome::Completed) => {
            info!(meeting_id, email, "Recording pipeline finished");
        }
        Ok(CollectOutcome::GaveUp) => {
            warn!(meeting_id, email, "Recording pipeline gave up with work left");
        }
        Err(e) => {
            warn!(meeting_id, email, error = %e, "Recording pipeline aborted");
        }
    }
}
