mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use common::{FakeProvider, RecordingsBehavior, StatusStep, base_time};
use lectoria::clock::ManualClock;
use lectoria::observability::Metrics;
use lectoria::poller::{MeetingStatusPoller, PollOutcome, PollPolicy};
use lectoria::provider::{MeetingStatus, RecordingFile, RecordingsPayload};
use lectoria::queue::{TaskStatus, TaskStore};
use lectoria::recordings::{
    DownloadStatus, FetchPolicy, InstanceOutcome, InstanceStatus, RecordingFetcher, RecordingStore,
};
use lectoria::storage::StorageClient;

struct Fixture {
    provider: Arc<FakeProvider>,
    clock: Arc<ManualClock>,
    tasks: Arc<TaskStore>,
    recordings: Arc<RecordingStore>,
    storage: Arc<StorageClient>,
    _temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let keyspace = fjall::Config::new(temp_dir.path().join("store"))
            .open()
            .unwrap();
        Self {
            provider: Arc::new(FakeProvider::new()),
            clock: Arc::new(ManualClock::starting_at(base_time())),
            tasks: Arc::new(TaskStore::open(&keyspace).unwrap()),
            recordings: Arc::new(RecordingStore::open(&keyspace).unwrap()),
            storage: Arc::new(StorageClient::in_memory()),
            _temp: temp_dir,
        }
    }

    fn poller(&self) -> MeetingStatusPoller {
        MeetingStatusPoller::new(
            self.provider.clone(),
            self.clock.clone(),
            PollPolicy::default(),
            Arc::new(Metrics::new()),
        )
    }

    fn fetcher(&self) -> RecordingFetcher {
        RecordingFetcher::new(
            self.provider.clone(),
            self.clock.clone(),
            self.recordings.clone(),
            self.tasks.clone(),
            self.storage.clone(),
            FetchPolicy::default(),
            Arc::new(Metrics::new()),
        )
    }
}

fn payload(uuid: &str, ids: &[&str]) -> RecordingsPayload {
    RecordingsPayload {
        uuid: uuid.to_string(),
        topic: "Algebra, week 4".to_string(),
        recording_files: ids
            .iter()
            .map(|id| RecordingFile {
                id: id.to_string(),
                recording_type: "shared_screen_with_speaker_view".to_string(),
                download_url: format!("https://example.com/{id}"),
                file_size: 1024,
                recording_start: None,
                recording_end: None,
                file_extension: Some("mp4".to_string()),
            })
            .collect(),
    }
}

#[tokio::test]
async fn poller_terminates_on_ended_after_three_iterations() {
    let fx = Fixture::new();
    fx.provider.script_statuses([
        StatusStep::Status(MeetingStatus::Started),
        StatusStep::Status(MeetingStatus::Started),
        StatusStep::Status(MeetingStatus::Ended),
    ]);

    let outcome = fx
        .poller()
        .poll_until_terminal("host@example.com", "m-1")
        .await;

    assert_eq!(outcome, PollOutcome::EndedOrWaiting);
    assert_eq!(fx.provider.status_call_count(), 3);
    // Two started iterations: first wait then second wait
    assert_eq!(
        fx.clock.slept(),
        vec![Duration::from_secs(120), Duration::from_secs(240)]
    );
}

#[tokio::test]
async fn poller_gives_up_after_consecutive_fetch_failures() {
    let fx = Fixture::new();
    fx.provider
        .script_statuses(std::iter::repeat_n(StatusStep::Fail, 5));

    let outcome = fx
        .poller()
        .poll_until_terminal("host@example.com", "m-1")
        .await;

    assert_eq!(outcome, PollOutcome::NotFound);
    assert_eq!(fx.provider.status_call_count(), 5);
    // Four failure waits before the fifth failure trips the ceiling
    assert_eq!(fx.clock.slept(), vec![Duration::from_secs(480); 4]);
}

#[tokio::test]
async fn poller_gives_up_on_a_meeting_that_never_ends() {
    let fx = Fixture::new();
    fx.provider.script_statuses(std::iter::repeat_n(
        StatusStep::Status(MeetingStatus::Started),
        21,
    ));

    let outcome = fx
        .poller()
        .poll_until_terminal("host@example.com", "m-1")
        .await;

    assert_eq!(outcome, PollOutcome::GaveUpOngoing);
    assert_eq!(fx.provider.status_call_count(), 21);
}

#[tokio::test]
async fn deleted_meeting_marks_task_terminal_and_persists_no_recordings() {
    let fx = Fixture::new();
    fx.tasks
        .enqueue("host@example.com", "m-1", base_time())
        .unwrap();
    fx.tasks.claim_due(base_time()).unwrap();

    fx.provider.set_recordings(
        "u-1",
        RecordingsBehavior::Deleted("Собрание не существует: 123.".to_string()),
    );

    let outcome = fx
        .fetcher()
        .fetch_instance("host@example.com", "m-1", "u-1")
        .await
        .unwrap();

    assert_eq!(outcome, InstanceOutcome::Deleted);
    assert_eq!(
        fx.tasks.get("m-1").unwrap().unwrap().status,
        TaskStatus::DeletedInZoom
    );

    let instance = fx.recordings.get_instance("m-1", "u-1").unwrap().unwrap();
    assert_eq!(instance.status, InstanceStatus::Deleted);
    assert!(fx.recordings.recordings_for_instance("u-1").unwrap().is_empty());
}

#[tokio::test]
async fn collect_all_downloads_available_recordings_and_finishes_task() {
    let fx = Fixture::new();
    fx.tasks
        .enqueue("host@example.com", "m-1", base_time())
        .unwrap();
    fx.tasks.claim_due(base_time()).unwrap();

    fx.provider.set_instances(&["u-1"]);
    fx.provider
        .set_recordings("u-1", RecordingsBehavior::Payload(payload("u-1", &["rec-1", "rec-2"])));

    let outcome = fx
        .fetcher()
        .collect_all("host@example.com", "m-1")
        .await
        .unwrap();

    assert_eq!(outcome, lectoria::recordings::CollectOutcome::Completed);
    assert_eq!(
        fx.tasks.get("m-1").unwrap().unwrap().status,
        TaskStatus::Done
    );

    for id in ["rec-1", "rec-2"] {
        let record = fx.recordings.get_recording("u-1", id).unwrap().unwrap();
        assert_eq!(record.download_status, DownloadStatus::Downloaded);
        let key = record.storage_path.unwrap();
        assert!(fx.storage.exists(&key).await.unwrap());
    }
    assert_eq!(fx.provider.fetch_call_count(), 2);
}

#[tokio::test]
async fn download_is_idempotent_per_recording_id() {
    let fx = Fixture::new();
    fx.tasks
        .enqueue("host@example.com", "m-1", base_time())
        .unwrap();

    fx.provider.set_instances(&["u-1"]);
    fx.provider
        .set_recordings("u-1", RecordingsBehavior::Payload(payload("u-1", &["rec-1"])));

    let fetcher = fx.fetcher();
    fetcher.collect_all("host@example.com", "m-1").await.unwrap();
    fetcher.collect_all("host@example.com", "m-1").await.unwrap();

    // Second run sees the stored artifact and never re-downloads
    assert_eq!(fx.provider.fetch_call_count(), 1);
    assert_eq!(
        fx.recordings.recordings_for_instance("u-1").unwrap().len(),
        1
    );
}

#[tokio::test]
async fn not_ready_instances_are_retried_until_the_ceiling() {
    let fx = Fixture::new();
    fx.tasks
        .enqueue("host@example.com", "m-1", base_time())
        .unwrap();
    fx.tasks.claim_due(base_time()).unwrap();

    fx.provider.set_instances(&["u-1"]);
    fx.provider.set_recordings("u-1", RecordingsBehavior::NotReady);

    let fetcher = RecordingFetcher::new(
        fx.provider.clone(),
        fx.clock.clone(),
        fx.recordings.clone(),
        fx.tasks.clone(),
        fx.storage.clone(),
        FetchPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
        },
        Arc::new(Metrics::new()),
    );

    let outcome = fetcher.collect_all("host@example.com", "m-1").await.unwrap();

    assert_eq!(outcome, lectoria::recordings::CollectOutcome::GaveUp);
    // Two retry sleeps for three attempts
    assert_eq!(fx.clock.slept(), vec![Duration::from_secs(10); 2]);
    // Task left non-terminal: an alert case, not a crash
    assert_eq!(
        fx.tasks.get("m-1").unwrap().unwrap().status,
        TaskStatus::InProgress
    );
}

#[test]
fn concurrent_trims_of_one_recording_are_mutually_exclusive() {
    let fx = Fixture::new();
    fx.recordings
        .insert_recording_if_absent(&lectoria::recordings::RecordingRecord {
            recording_id: "rec-1".to_string(),
            meeting_uuid: "u-1".to_string(),
            recording_type: "shared_screen_with_speaker_view".to_string(),
            download_url: "https://example.com/rec-1".to_string(),
            file_size: 1024,
            file_extension: Some("mp4".to_string()),
            download_status: DownloadStatus::Downloaded,
            filename: Some("recording_rec-1.mp4".to_string()),
            storage_path: Some("recordings/x/rec-1.mp4".to_string()),
            trim: false,
            trim_markers: None,
            trimming_in_progress: false,
        })
        .unwrap();

    let recordings = fx.recordings.clone();
    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = recordings.clone();
                scope.spawn(move || store.begin_trim("u-1", "rec-1").is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Exactly one trim claims the guard
    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
}
