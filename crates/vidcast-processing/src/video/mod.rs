//! Video encoding module

pub mod ffmpeg;
pub mod local;
pub mod orchestration;
pub mod preset;
pub mod service;

pub use ffmpeg::{EncodeExecutor, FfmpegEncoder};
pub use local::LocalTranscodeService;
pub use orchestration::{OrchestratorConfig, TranscodeOrchestrator};
pub use preset::EncodePreset;
pub use service::{TranscodeError, TranscodeService};
