//! Lazy artifact generation guard.
//!
//! The homepage is a derived static file generated on demand by an external
//! generator. The guard treats existence-check and generation as one logical
//! acquire-or-create operation: concurrent first requests serialize on a
//! per-path gate so at most one generation runs at a time, and a generation
//! failure degrades to a transient-unavailable answer instead of an error.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::warn;

use crate::codes;
use crate::collaborators::ArtifactGenerator;

/// Outcome of [`ArtifactGuard::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// The artifact exists and can be served.
    Ready,
    /// The artifact is still absent (generation pending or failed); callers
    /// should answer with a transient "retry later" status, not an error.
    Unavailable,
}

/// Ensures a derived artifact exists before it is served, generating it on
/// demand exactly once per absence.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    gate: Mutex<()>,
}

impl ArtifactGuard {
    /// Guard for the artifact at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            gate: Mutex::new(()),
        }
    }

    /// The guarded artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the artifact exists, invoking `generator` at most once if it
    /// is absent.
    ///
    /// A present artifact returns `Ready` with no side effect. When absent,
    /// callers serialize on the gate: the winner generates, later callers
    /// wait and then observe the winner's result through the re-check,
    /// never a second generation for the same absence. Generator failure is
    /// logged with its category code and not raised; the final existence
    /// re-check decides between `Ready` and `Unavailable`.
    pub async fn ensure(&self, generator: &dyn ArtifactGenerator) -> ArtifactStatus {
        if self.exists().await {
            return ArtifactStatus::Ready;
        }

        let _gate = self.gate.lock().await;

        // A concurrent caller may have generated while this one waited on
        // the gate.
        if self.exists().await {
            return ArtifactStatus::Ready;
        }

        if let Err(error) = generator.generate(&self.path).await {
            warn!(
                code = codes::ARTIFACT_GENERATE,
                path = %self.path.display(),
                error = %error,
                "artifact generation failed; serving transient-unavailable"
            );
        }

        if self.exists().await {
            ArtifactStatus::Ready
        } else {
            ArtifactStatus::Unavailable
        }
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}
