//! Encode job orchestration for a published asset.
//!
//! Builds the rendition chain, submits it to a [`TranscodeService`] and waits
//! for a terminal state. State changes arrive on the service's watch channel;
//! a periodic `job` lookup covers a closed channel. The wait is bounded by
//! the configured timeout and can be canceled by the caller.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vidcast_core::constants::DEFAULT_ENCODER_PROCESSOR;
use vidcast_core::models::{
    default_ladder, Asset, AssetId, EncodeJobRequest, EncodeTask, JobState, MediaProcessor,
    RenditionSource, RenditionSpec, TaskInput,
};
use vidcast_core::{AppError, Config};
use vidcast_storage::MediaCatalog;

use super::service::TranscodeService;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub processor_name: String,
    pub renditions: Vec<RenditionSpec>,
    pub job_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            processor_name: DEFAULT_ENCODER_PROCESSOR.to_string(),
            renditions: default_ladder(),
            job_timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            processor_name: config.encoder_processor_name().to_string(),
            renditions: config.renditions().to_vec(),
            job_timeout: Duration::from_secs(config.job_timeout_secs()),
            poll_interval: Duration::from_millis(config.job_poll_interval_ms()),
        }
    }
}

/// Numeric components of a dotted version. Non-numeric parts count as 0.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            part.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .collect()
}

/// Newest processor called `name`.
pub fn newest_processor(processors: Vec<MediaProcessor>, name: &str) -> Option<MediaProcessor> {
    processors
        .into_iter()
        .filter(|p| p.name == name)
        .max_by(|a, b| version_key(&a.version).cmp(&version_key(&b.version)))
}

pub struct TranscodeOrchestrator {
    service: Arc<dyn TranscodeService>,
    catalog: Arc<dyn MediaCatalog>,
    config: OrchestratorConfig,
}

impl TranscodeOrchestrator {
    pub fn new(
        service: Arc<dyn TranscodeService>,
        catalog: Arc<dyn MediaCatalog>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            service,
            catalog,
            config,
        }
    }

    pub fn renditions(&self) -> &[RenditionSpec] {
        &self.config.renditions
    }

    pub async fn resolve_processor(&self) -> Result<MediaProcessor, AppError> {
        let processors = self.service.list_processors().await?;
        newest_processor(processors, &self.config.processor_name)
            .ok_or_else(|| AppError::UnknownProcessor(self.config.processor_name.clone()))
    }

    /// One task per rendition, in ladder order. A rendition sourced from an
    /// earlier one reads that task's output.
    pub fn build_job(
        &self,
        asset: &Asset,
        file_name: &str,
        processor: &MediaProcessor,
    ) -> Result<EncodeJobRequest, AppError> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut tasks = Vec::with_capacity(self.config.renditions.len());

        for (index, rendition) in self.config.renditions.iter().enumerate() {
            let input = match &rendition.source {
                RenditionSource::Original => TaskInput::Asset(asset.id.clone()),
                RenditionSource::Rendition(key) => {
                    let source = positions.get(key.as_str()).ok_or_else(|| {
                        AppError::InvalidInput(format!(
                            "Rendition '{}' reads from '{}' which is not encoded before it",
                            rendition.key, key
                        ))
                    })?;
                    TaskInput::TaskOutput(*source)
                }
            };
            tasks.push(EncodeTask {
                name: format!("{} encoding task", rendition.preset),
                processor_id: processor.id.clone(),
                preset: rendition.preset.clone(),
                input,
                output_asset_name: rendition.output_asset_name(file_name),
                rendition: rendition.key.clone(),
            });
            positions.insert(rendition.key.as_str(), index);
        }

        Ok(EncodeJobRequest {
            name: format!("Asset job: {}", asset.id),
            tasks,
        })
    }

    /// Encode every configured rendition of `asset` and return the output
    /// asset per rendition key. Nothing is returned unless the job finished.
    #[tracing::instrument(skip(self, asset, cancel), fields(asset_id = %asset.id))]
    pub async fn transcode(
        &self,
        asset: &Asset,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, AssetId>, AppError> {
        let asset = match asset.primary_object_name {
            Some(_) => asset.clone(),
            None => self.catalog.set_primary_file(&asset.id, file_name).await?,
        };

        let processor = self.resolve_processor().await?;
        let request = self.build_job(&asset, file_name, &processor)?;
        let job = self.service.submit_job(request).await?;
        tracing::info!(
            job_id = %job.id,
            processor = %processor.name,
            processor_version = %processor.version,
            tasks = job.tasks.len(),
            "Encode job submitted"
        );

        let rx = self.service.subscribe(job.id).await?;
        spawn_state_logger(job.id, rx.clone());

        let state = self.wait_terminal(job.id, rx, cancel).await?;
        if state != JobState::Finished {
            let detail = self.service.job(job.id).await.ok().and_then(|j| j.error_message);
            tracing::error!(
                job_id = %job.id,
                state = %state,
                error = detail.as_deref().unwrap_or(""),
                "Encode job did not finish"
            );
            return Err(AppError::JobFailed {
                job_id: job.id.to_string(),
                state,
            });
        }

        let outputs = self.service.job_outputs(job.id).await?;
        let by_key: BTreeMap<String, AssetId> = outputs
            .into_iter()
            .map(|output| (output.rendition, output.asset_id))
            .collect();
        for rendition in &self.config.renditions {
            if !by_key.contains_key(&rendition.key) {
                return Err(AppError::Transcode(format!(
                    "Job {} has no output for rendition '{}'",
                    job.id, rendition.key
                )));
            }
        }
        Ok(by_key)
    }

    /// Ask the service to stop a job nobody waits for any more. Failures
    /// are logged and otherwise ignored.
    async fn cancel_quietly(&self, job_id: Uuid) {
        if let Err(e) = self.service.cancel_job(job_id).await {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to cancel encode job");
        }
    }

    async fn wait_terminal(
        &self,
        job_id: Uuid,
        mut rx: watch::Receiver<JobState>,
        cancel: &CancellationToken,
    ) -> Result<JobState, AppError> {
        let current = *rx.borrow_and_update();
        if current.is_terminal() {
            return Ok(current);
        }

        let deadline = tokio::time::sleep(self.config.job_timeout);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut watching = true;

        loop {
            tokio::select! {
                changed = rx.changed(), if watching => {
                    if changed.is_err() {
                        tracing::debug!(job_id = %job_id, "State channel closed, polling");
                        watching = false;
                        continue;
                    }
                    let state = *rx.borrow_and_update();
                    if state.is_terminal() {
                        return Ok(state);
                    }
                }
                _ = poll.tick() => {
                    let job = self.service.job(job_id).await?;
                    if job.state.is_terminal() {
                        return Ok(job.state);
                    }
                }
                _ = &mut deadline => {
                    self.cancel_quietly(job_id).await;
                    return Err(AppError::JobTimeout {
                        job_id: job_id.to_string(),
                        waited_secs: self.config.job_timeout.as_secs(),
                    });
                }
                _ = cancel.cancelled() => {
                    self.cancel_quietly(job_id).await;
                    return Err(AppError::JobCanceled(job_id.to_string()));
                }
            }
        }
    }
}

/// Log every state change of a job until it ends.
fn spawn_state_logger(job_id: Uuid, mut rx: watch::Receiver<JobState>) {
    tokio::spawn(async move {
        let mut last = *rx.borrow_and_update();
        tracing::debug!(job_id = %job_id, state = %last, "Encode job state");
        while !last.is_terminal() && rx.changed().await.is_ok() {
            last = *rx.borrow_and_update();
            tracing::info!(job_id = %job_id, state = %last, "Encode job state changed");
        }
    });
}
