use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::pipeline::PipelineDeps;
use crate::queue::TaskStore;
use crate::recordings::{RecordingStore, Trimmer};
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tasks: Arc<TaskStore>,
    pub recordings: Arc<RecordingStore>,
    pub storage: Arc<StorageClient>,
    pub pipeline: Arc<PipelineDeps>,
    pub trimmer: Arc<dyn Trimmer>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        pipeline: Arc<PipelineDeps>,
        trimmer: Arc<dyn Trimmer>,
    ) -> Self {
        Self {
            config,
            tasks: pipeline.tasks.clone(),
            recordings: pipeline.recordings.clone(),
            storage: pipeline.storage.clone(),
            metrics: pipeline.metrics.clone(),
            pipeline,
            trimmer,
        }
    }
}
