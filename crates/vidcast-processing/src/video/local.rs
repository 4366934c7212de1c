//! In-process transcode service.
//!
//! Each submitted job runs on its own tokio task. A semaphore bounds how many
//! jobs encode at once; jobs waiting for a permit stay `Queued`. Tasks of a
//! job run in order, each reading the primary object of its input asset and
//! writing one new output asset. If a job fails or is canceled, the output
//! assets it already wrote are destroyed.
//!
//! Job records are dropped once the outputs of a finished job are read, or
//! after a retention period once the job reaches a terminal state.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vidcast_core::models::{
    Asset, EncodeJob, EncodeJobRequest, EncodeTask, JobOutput, JobState, MediaProcessor, TaskInput,
};
use vidcast_storage::{BlobStore, MediaCatalog, StorageError};

use super::ffmpeg::EncodeExecutor;
use super::preset::EncodePreset;
use super::service::{TranscodeError, TranscodeService};

/// How long a terminal job stays queryable when nobody reads its outputs.
const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(10 * 60);

struct JobEntry {
    job: EncodeJob,
    state_tx: watch::Sender<JobState>,
    outputs: Vec<JobOutput>,
    cancel: CancellationToken,
}

struct Inner {
    processor: MediaProcessor,
    executor: Arc<dyn EncodeExecutor>,
    store: Arc<dyn BlobStore>,
    catalog: Arc<dyn MediaCatalog>,
    permits: Arc<Semaphore>,
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
}

/// Why a running job stopped early.
enum Interrupt {
    Canceled,
    Failed(TranscodeError),
}

impl From<TranscodeError> for Interrupt {
    fn from(err: TranscodeError) -> Self {
        Interrupt::Failed(err)
    }
}

impl From<StorageError> for Interrupt {
    fn from(err: StorageError) -> Self {
        Interrupt::Failed(err.into())
    }
}

impl From<std::io::Error> for Interrupt {
    fn from(err: std::io::Error) -> Self {
        Interrupt::Failed(err.into())
    }
}

#[derive(Clone)]
pub struct LocalTranscodeService {
    inner: Arc<Inner>,
    retention: Duration,
}

impl LocalTranscodeService {
    pub fn new(
        processor: MediaProcessor,
        executor: Arc<dyn EncodeExecutor>,
        store: Arc<dyn BlobStore>,
        catalog: Arc<dyn MediaCatalog>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                processor,
                executor,
                store,
                catalog,
                permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
                jobs: RwLock::new(HashMap::new()),
            }),
            retention: DEFAULT_JOB_RETENTION,
        }
    }

    /// Keep terminal jobs for `retention` before dropping them.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn processor(&self) -> &MediaProcessor {
        &self.inner.processor
    }

    fn check_tasks(&self, tasks: &[EncodeTask]) -> Result<(), TranscodeError> {
        if tasks.is_empty() {
            return Err(TranscodeError::InvalidTask(
                "Job has no tasks".to_string(),
            ));
        }
        for (index, task) in tasks.iter().enumerate() {
            if task.processor_id != self.inner.processor.id {
                return Err(TranscodeError::UnknownProcessor(task.processor_id.clone()));
            }
            if EncodePreset::lookup(&task.preset).is_none() {
                return Err(TranscodeError::UnknownPreset(task.preset.clone()));
            }
            if let TaskInput::TaskOutput(source) = task.input {
                if source >= index {
                    return Err(TranscodeError::InvalidTask(format!(
                        "Task '{}' reads output of task {} which does not run before it",
                        task.name, source
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Inner {
    async fn set_state(&self, job_id: Uuid, state: JobState, error_message: Option<String>) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(&job_id) {
            if entry.job.state.is_terminal() {
                return;
            }
            entry.job.state = state;
            entry.job.updated_at = Utc::now();
            entry.job.error_message = error_message;
            entry.state_tx.send_replace(state);
        }
    }

    async fn run(
        self: Arc<Self>,
        job_id: Uuid,
        tasks: Vec<EncodeTask>,
        cancel: CancellationToken,
        retention: Duration,
    ) {
        self.clone().process(job_id, tasks, cancel).await;

        tokio::time::sleep(retention).await;
        if self.jobs.write().await.remove(&job_id).is_some() {
            tracing::debug!(job_id = %job_id, "Encode job record evicted");
        }
    }

    #[tracing::instrument(skip(self, tasks, cancel), fields(job_id = %job_id))]
    async fn process(self: Arc<Self>, job_id: Uuid, tasks: Vec<EncodeTask>, cancel: CancellationToken) {
        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => permit,
            _ = cancel.cancelled() => {
                self.set_state(job_id, JobState::Canceled, None).await;
                return;
            }
        };
        let Ok(_permit) = permit else {
            self.set_state(
                job_id,
                JobState::Error,
                Some("Transcode worker pool is closed".to_string()),
            )
            .await;
            return;
        };

        self.set_state(job_id, JobState::Scheduled, None).await;
        let start = std::time::Instant::now();

        match self.execute(job_id, &tasks, &cancel).await {
            Ok(outputs) => {
                {
                    let mut jobs = self.jobs.write().await;
                    if let Some(entry) = jobs.get_mut(&job_id) {
                        entry.outputs = outputs;
                    }
                }
                self.set_state(job_id, JobState::Finished, None).await;
                tracing::info!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Encode job finished"
                );
            }
            Err(Interrupt::Canceled) => {
                self.set_state(job_id, JobState::Canceled, None).await;
                tracing::info!("Encode job canceled");
            }
            Err(Interrupt::Failed(e)) => {
                tracing::error!(error = %e, "Encode job failed");
                self.set_state(job_id, JobState::Error, Some(e.to_string()))
                    .await;
            }
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        tasks: &[EncodeTask],
        cancel: &CancellationToken,
    ) -> Result<Vec<JobOutput>, Interrupt> {
        let mut created = Vec::new();
        let result = self.execute_tasks(job_id, tasks, cancel, &mut created).await;
        if result.is_err() {
            self.discard(&created).await;
        }
        result
    }

    /// Destroy output assets of a job that did not finish.
    async fn discard(&self, created: &[Asset]) {
        for asset in created {
            if let Err(e) = self.store.delete_container(&asset.container).await {
                tracing::warn!(
                    asset_id = %asset.id,
                    container = %asset.container,
                    error = %e,
                    "Failed to delete output container"
                );
            }
            if let Err(e) = self.catalog.mark_destroyed(&asset.id).await {
                tracing::warn!(asset_id = %asset.id, error = %e, "Failed to destroy output asset");
            }
        }
        if !created.is_empty() {
            tracing::info!(assets = created.len(), "Discarded outputs of unfinished job");
        }
    }

    async fn execute_tasks(
        &self,
        job_id: Uuid,
        tasks: &[EncodeTask],
        cancel: &CancellationToken,
        created: &mut Vec<Asset>,
    ) -> Result<Vec<JobOutput>, Interrupt> {
        let workdir = tempfile::tempdir()?;
        let mut outputs: Vec<JobOutput> = Vec::with_capacity(tasks.len());

        self.set_state(job_id, JobState::Processing, None).await;

        for (index, task) in tasks.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Interrupt::Canceled);
            }

            let input_asset_id = match &task.input {
                TaskInput::Asset(id) => id.clone(),
                TaskInput::TaskOutput(source) => outputs[*source].asset_id.clone(),
            };
            let input_asset = self
                .catalog
                .get_asset(&input_asset_id)
                .await?
                .ok_or_else(|| StorageError::NotFound(input_asset_id.to_string()))?;
            let input_object = input_asset
                .primary_object_name
                .clone()
                .or_else(|| input_asset.primary_file().map(|f| f.name.clone()))
                .ok_or_else(|| {
                    TranscodeError::InvalidTask(format!(
                        "Asset {} has no primary file",
                        input_asset.id
                    ))
                })?;
            let preset = EncodePreset::lookup(&task.preset)
                .ok_or_else(|| TranscodeError::UnknownPreset(task.preset.clone()))?;

            let data = self
                .store
                .get_object(&input_asset.container, &input_object)
                .await?;
            let extension = Path::new(&input_object)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin");
            let input_path = workdir.path().join(format!("input-{}.{}", index, extension));
            let output_path = workdir.path().join(format!("output-{}.mp4", index));
            tokio::fs::write(&input_path, &data).await?;

            tracing::debug!(
                task = %task.name,
                input_asset_id = %input_asset.id,
                input_object = %input_object,
                size_bytes = data.len(),
                "Encoding task input"
            );

            tokio::select! {
                result = self.executor.encode(&input_path, &output_path, preset) => result?,
                _ = cancel.cancelled() => return Err(Interrupt::Canceled),
            }

            let object_name = preset.output_object_name(&input_object);
            let encoded = tokio::fs::read(&output_path).await?;
            let output_asset = self.catalog.create_asset(&task.output_asset_name).await?;
            created.push(output_asset.clone());
            self.store.create_container(&output_asset.container).await?;
            self.store
                .put_object(&output_asset.container, &object_name, Bytes::from(encoded))
                .await?;
            self.catalog.add_file(&output_asset.id, &object_name).await?;
            self.catalog
                .set_primary_file(&output_asset.id, &object_name)
                .await?;

            tracing::info!(
                task = %task.name,
                rendition = %task.rendition,
                output_asset_id = %output_asset.id,
                object = %object_name,
                "Encode task finished"
            );

            outputs.push(JobOutput {
                rendition: task.rendition.clone(),
                asset_id: output_asset.id,
            });
        }

        Ok(outputs)
    }
}

#[async_trait]
impl TranscodeService for LocalTranscodeService {
    async fn list_processors(&self) -> Result<Vec<MediaProcessor>, TranscodeError> {
        Ok(vec![self.inner.processor.clone()])
    }

    #[tracing::instrument(skip(self, request), fields(job_name = %request.name, tasks = request.tasks.len()))]
    async fn submit_job(&self, request: EncodeJobRequest) -> Result<EncodeJob, TranscodeError> {
        self.check_tasks(&request.tasks)?;

        let now = Utc::now();
        let job = EncodeJob {
            id: Uuid::new_v4(),
            name: request.name,
            tasks: request.tasks,
            state: JobState::Queued,
            created_at: now,
            updated_at: now,
            error_message: None,
        };
        let (state_tx, _) = watch::channel(JobState::Queued);
        let cancel = CancellationToken::new();

        self.inner.jobs.write().await.insert(
            job.id,
            JobEntry {
                job: job.clone(),
                state_tx,
                outputs: Vec::new(),
                cancel: cancel.clone(),
            },
        );

        tracing::info!(job_id = %job.id, "Encode job queued");
        tokio::spawn(
            self.inner
                .clone()
                .run(job.id, job.tasks.clone(), cancel, self.retention),
        );

        Ok(job)
    }

    async fn job(&self, job_id: Uuid) -> Result<EncodeJob, TranscodeError> {
        self.inner
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.job.clone())
            .ok_or(TranscodeError::JobNotFound(job_id))
    }

    async fn subscribe(&self, job_id: Uuid) -> Result<watch::Receiver<JobState>, TranscodeError> {
        self.inner
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.state_tx.subscribe())
            .ok_or(TranscodeError::JobNotFound(job_id))
    }

    async fn job_outputs(&self, job_id: Uuid) -> Result<Vec<JobOutput>, TranscodeError> {
        let mut jobs = self.inner.jobs.write().await;
        let entry = jobs.get(&job_id).ok_or(TranscodeError::JobNotFound(job_id))?;
        if entry.job.state != JobState::Finished {
            return Err(TranscodeError::NotFinished(job_id));
        }
        let outputs = jobs
            .remove(&job_id)
            .map(|entry| entry.outputs)
            .unwrap_or_default();
        tracing::debug!(job_id = %job_id, "Encode job outputs handed out");
        Ok(outputs)
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<(), TranscodeError> {
        let jobs = self.inner.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or(TranscodeError::JobNotFound(job_id))?;
        if !entry.job.state.is_terminal() {
            tracing::info!(job_id = %job_id, "Cancel requested");
            entry.cancel.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;
    use vidcast_core::models::AssetId;
    use vidcast_storage::{InMemoryCatalog, ObjectBlobStore};

    /// Writes `{preset}:` followed by the input bytes.
    pub(crate) struct TaggingEncoder;

    #[async_trait]
    impl EncodeExecutor for TaggingEncoder {
        async fn encode(
            &self,
            input: &Path,
            output: &Path,
            preset: &EncodePreset,
        ) -> Result<(), TranscodeError> {
            let mut data = format!("{}:", preset.height).into_bytes();
            data.extend(tokio::fs::read(input).await?);
            tokio::fs::write(output, data).await?;
            Ok(())
        }
    }

    struct FailingEncoder;

    #[async_trait]
    impl EncodeExecutor for FailingEncoder {
        async fn encode(&self, _: &Path, _: &Path, _: &EncodePreset) -> Result<(), TranscodeError> {
            Err(TranscodeError::EncoderFailed("corrupt input".to_string()))
        }
    }

    /// Encodes the first task, fails every later one.
    #[derive(Default)]
    struct FailsAfterFirst(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl EncodeExecutor for FailsAfterFirst {
        async fn encode(
            &self,
            input: &Path,
            output: &Path,
            preset: &EncodePreset,
        ) -> Result<(), TranscodeError> {
            if self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                return Err(TranscodeError::EncoderFailed("disk full".to_string()));
            }
            TaggingEncoder.encode(input, output, preset).await
        }
    }

    struct BlockedEncoder(Arc<Notify>);

    #[async_trait]
    impl EncodeExecutor for BlockedEncoder {
        async fn encode(&self, _: &Path, _: &Path, _: &EncodePreset) -> Result<(), TranscodeError> {
            self.0.notified().await;
            Ok(())
        }
    }

    pub(crate) fn processor() -> MediaProcessor {
        MediaProcessor {
            id: "mp-test".to_string(),
            name: "Media Encoder".to_string(),
            version: "6.1.1".to_string(),
        }
    }

    async fn fixture(
        executor: Arc<dyn EncodeExecutor>,
    ) -> (LocalTranscodeService, Arc<InMemoryCatalog>, Arc<dyn BlobStore>, AssetId) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let asset = catalog.create_asset("videoOriginal - clip.mp4").await.unwrap();
        store.create_container(&asset.container).await.unwrap();
        store
            .put_object(&asset.container, "clip.mp4", Bytes::from_static(b"source"))
            .await
            .unwrap();
        catalog.add_file(&asset.id, "clip.mp4").await.unwrap();
        catalog.set_primary_file(&asset.id, "clip.mp4").await.unwrap();

        let service =
            LocalTranscodeService::new(processor(), executor, store.clone(), catalog.clone(), 2);
        (service, catalog, store, asset.id)
    }

    fn task(name: &str, preset: &str, input: TaskInput, rendition: &str) -> EncodeTask {
        EncodeTask {
            name: name.to_string(),
            processor_id: "mp-test".to_string(),
            preset: preset.to_string(),
            input,
            output_asset_name: format!("video{} - clip.mp4", rendition),
            rendition: rendition.to_string(),
        }
    }

    fn chained(asset_id: &AssetId) -> EncodeJobRequest {
        EncodeJobRequest {
            name: format!("Asset job: {}", asset_id),
            tasks: vec![
                task(
                    "720p",
                    "H264 Broadband 720p",
                    TaskInput::Asset(asset_id.clone()),
                    "renditionA",
                ),
                task(
                    "sd",
                    "H264 Broadband SD 16x9",
                    TaskInput::TaskOutput(0),
                    "renditionB",
                ),
            ],
        }
    }

    async fn wait_terminal(rx: &mut watch::Receiver<JobState>) -> JobState {
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.is_terminal()))
            .await
            .expect("job did not reach a terminal state")
            .expect("state channel closed");
        *state
    }

    #[tokio::test]
    async fn test_chained_job_feeds_previous_output() {
        let (service, catalog, store, asset_id) = fixture(Arc::new(TaggingEncoder)).await;
        let job = service.submit_job(chained(&asset_id)).await.unwrap();
        assert_eq!(job.state, JobState::Queued);

        let mut rx = service.subscribe(job.id).await.unwrap();
        assert_eq!(wait_terminal(&mut rx).await, JobState::Finished);

        let outputs = service.job_outputs(job.id).await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].rendition, "renditionA");
        assert_eq!(outputs[1].rendition, "renditionB");

        let small = catalog.get_asset(&outputs[1].asset_id).await.unwrap().unwrap();
        assert_eq!(small.name, "videorenditionB - clip.mp4");
        let object = small.primary_object_name.clone().unwrap();
        assert_eq!(object, "clip_1280x720_3400_640x360_1500.mp4");
        let data = store.get_object(&small.container, &object).await.unwrap();
        assert_eq!(&data[..], b"360:720:source");
    }

    #[tokio::test]
    async fn test_encoder_failure_ends_in_error_state() {
        let (service, _, _, asset_id) = fixture(Arc::new(FailingEncoder)).await;
        let job = service.submit_job(chained(&asset_id)).await.unwrap();
        let mut rx = service.subscribe(job.id).await.unwrap();

        assert_eq!(wait_terminal(&mut rx).await, JobState::Error);
        let job = service.job(job.id).await.unwrap();
        assert!(job.error_message.unwrap().contains("corrupt input"));
        assert!(matches!(
            service.job_outputs(job.id).await,
            Err(TranscodeError::NotFinished(_))
        ));
    }

    #[tokio::test]
    async fn test_outputs_are_handed_out_once() {
        let (service, _, _, asset_id) = fixture(Arc::new(TaggingEncoder)).await;
        let job = service.submit_job(chained(&asset_id)).await.unwrap();
        let mut rx = service.subscribe(job.id).await.unwrap();
        assert_eq!(wait_terminal(&mut rx).await, JobState::Finished);

        assert_eq!(service.job_outputs(job.id).await.unwrap().len(), 2);
        assert!(matches!(
            service.job_outputs(job.id).await,
            Err(TranscodeError::JobNotFound(_))
        ));
        assert!(matches!(
            service.job(job.id).await,
            Err(TranscodeError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_terminal_job_is_evicted_after_retention() {
        let (service, _, _, asset_id) = fixture(Arc::new(FailingEncoder)).await;
        let service = service.with_retention(Duration::from_millis(20));
        let job = service.submit_job(chained(&asset_id)).await.unwrap();
        let mut rx = service.subscribe(job.id).await.unwrap();

        assert_eq!(wait_terminal(&mut rx).await, JobState::Error);
        assert_eq!(service.job(job.id).await.unwrap().state, JobState::Error);

        tokio::time::timeout(Duration::from_secs(5), async {
            while service.job(job.id).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job record was not evicted");
    }

    #[tokio::test]
    async fn test_failed_job_destroys_outputs_already_written() {
        let (service, catalog, store, asset_id) =
            fixture(Arc::new(FailsAfterFirst::default())).await;
        let job = service.submit_job(chained(&asset_id)).await.unwrap();
        let mut rx = service.subscribe(job.id).await.unwrap();
        assert_eq!(wait_terminal(&mut rx).await, JobState::Error);

        let written = catalog.assets_named("videorenditionA - clip.mp4").await;
        assert_eq!(written.len(), 1);
        assert!(written[0].is_destroyed());
        assert!(!store.container_exists(&written[0].container).await.unwrap());
        assert!(catalog.assets_named("videorenditionB - clip.mp4").await.is_empty());

        let source = catalog.get_asset(&asset_id).await.unwrap().unwrap();
        assert!(!source.is_destroyed());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_encode() {
        let gate = Arc::new(Notify::new());
        let (service, _, _, asset_id) = fixture(Arc::new(BlockedEncoder(gate))).await;
        let job = service.submit_job(chained(&asset_id)).await.unwrap();
        let mut rx = service.subscribe(job.id).await.unwrap();

        rx.wait_for(|s| *s == JobState::Processing).await.unwrap();
        service.cancel_job(job.id).await.unwrap();
        assert_eq!(wait_terminal(&mut rx).await, JobState::Canceled);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_task_graphs() {
        let (service, _, _, asset_id) = fixture(Arc::new(TaggingEncoder)).await;

        let mut forward = chained(&asset_id);
        forward.tasks[0].input = TaskInput::TaskOutput(1);
        assert!(matches!(
            service.submit_job(forward).await,
            Err(TranscodeError::InvalidTask(_))
        ));

        let mut foreign = chained(&asset_id);
        foreign.tasks[1].processor_id = "mp-other".to_string();
        assert!(matches!(
            service.submit_job(foreign).await,
            Err(TranscodeError::UnknownProcessor(_))
        ));

        let mut preset = chained(&asset_id);
        preset.tasks[0].preset = "H265 4K".to_string();
        assert!(matches!(
            service.submit_job(preset).await,
            Err(TranscodeError::UnknownPreset(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (service, _, _, _) = fixture(Arc::new(TaggingEncoder)).await;
        assert!(matches!(
            service.job(Uuid::new_v4()).await,
            Err(TranscodeError::JobNotFound(_))
        ));
    }
}
