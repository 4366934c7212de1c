//! Vidcast Processing Library
//!
//! Server side of the upload/publish pipeline: file-name validation, upload
//! registration, the post-upload size guard, encode job orchestration,
//! locator construction and the publish coordinator that sequences them.

pub mod locator;
pub mod pipeline;
pub mod policy_cache;
pub mod registry;
pub mod size_guard;
pub mod validator;
pub mod video;

pub use locator::{encode_for_client, LocatorService};
pub use pipeline::PublishPipeline;
pub use policy_cache::PolicyCache;
pub use registry::{AssetRegistry, UploadTarget};
pub use size_guard::{SizeGuard, SizeVerdict};
pub use validator::{ValidationError, VideoValidator};
pub use video::{
    LocalTranscodeService, OrchestratorConfig, TranscodeError, TranscodeOrchestrator,
    TranscodeService,
};
