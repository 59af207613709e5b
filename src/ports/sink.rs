use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{Artifact, DomainError};

/// Port for saving an artifact somewhere the user can find it.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist `artifact` under `filename` and return where it ended up.
    ///
    /// Any temporary reference created along the way is released before
    /// returning, on success and on failure.
    async fn save(&self, artifact: &Artifact, filename: &str) -> Result<PathBuf, DomainError>;
}
