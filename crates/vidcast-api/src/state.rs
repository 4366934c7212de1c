//! Application state shared by every handler.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vidcast_core::Config;
use vidcast_processing::{AssetRegistry, PublishPipeline};
use vidcast_storage::{BlobStore, MediaCatalog, SasSigner};

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn MediaCatalog>,
    pub store: Arc<dyn BlobStore>,
    /// Verifies signatures presented to the blob gateway.
    pub signer: SasSigner,
    pub registry: AssetRegistry,
    pub pipeline: PublishPipeline,
    /// Canceled on shutdown; in-flight publishes stop waiting on their job.
    pub shutdown: CancellationToken,
}
