use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::AssetId;

/// Lifecycle of an encode job.
///
/// `Queued -> Scheduled -> Processing -> {Finished, Error, Canceled}`.
/// Only `Finished` is a success terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Scheduled,
    Processing,
    Finished,
    Error,
    Canceled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Error | JobState::Canceled
        )
    }

    pub fn is_success(&self) -> bool {
        *self == JobState::Finished
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Scheduled => write!(f, "scheduled"),
            JobState::Processing => write!(f, "processing"),
            JobState::Finished => write!(f, "finished"),
            JobState::Error => write!(f, "error"),
            JobState::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for JobState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "scheduled" => Ok(JobState::Scheduled),
            "processing" => Ok(JobState::Processing),
            "finished" => Ok(JobState::Finished),
            "error" => Ok(JobState::Error),
            "canceled" => Ok(JobState::Canceled),
            _ => Err(anyhow::anyhow!("Invalid job state: {}", s)),
        }
    }
}

/// An encoder installation exposed by the transcode service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProcessor {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Where a task reads its input from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TaskInput {
    /// The primary file of an existing asset.
    Asset(AssetId),
    /// The output asset of an earlier task in the same job, by index.
    TaskOutput(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeTask {
    pub name: String,
    pub processor_id: String,
    pub preset: String,
    pub input: TaskInput,
    pub output_asset_name: String,
    /// Logical output key this task produces, e.g. `renditionA`.
    pub rendition: String,
}

/// A job as submitted to the transcode service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeJobRequest {
    pub name: String,
    pub tasks: Vec<EncodeTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeJob {
    pub id: Uuid,
    pub name: String,
    pub tasks: Vec<EncodeTask>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Output asset produced by one task of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub rendition: String,
    pub asset_id: AssetId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_finished_is_success() {
        for state in [
            JobState::Queued,
            JobState::Scheduled,
            JobState::Processing,
            JobState::Error,
            JobState::Canceled,
        ] {
            assert!(!state.is_success(), "{} must not be success", state);
        }
        assert!(JobState::Finished.is_success());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Finished.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(JobState::Canceled.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(!JobState::Queued.is_terminal());
    }

    #[test]
    fn test_job_state_parse() {
        assert_eq!(
            "processing".parse::<JobState>().unwrap(),
            JobState::Processing
        );
        assert!("done".parse::<JobState>().is_err());
    }
}
