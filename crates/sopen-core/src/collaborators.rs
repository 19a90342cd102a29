//! Traits for the external collaborators the core calls.
//!
//! The internals behind these seams (datastore drivers, broker protocols,
//! cron semantics, rendering) are not this crate's business. The server
//! crate supplies concrete implementations; tests supply stubs.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::dependency::DependencyError;
use crate::publish::PublishJob;

/// Errors from artifact generation.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Filesystem failure while writing the artifact.
    #[error("artifact I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The generator could not produce the artifact.
    #[error("artifact generation failed: {reason}")]
    Failed {
        /// Generator-supplied failure description.
        reason: String,
    },
}

/// Errors from starting a background collaborator (scheduler, watcher).
#[derive(Debug, Error)]
pub enum StartError {
    /// Filesystem failure during startup (missing watch directory, etc.).
    #[error("startup I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The collaborator could not start for a non-I/O reason.
    #[error("failed to start: {reason}")]
    Unavailable {
        /// Collaborator-supplied failure description.
        reason: String,
    },
}

/// Errors from queue operations past the initial connect.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A publish job could not be enqueued.
    #[error("enqueue failed: {reason}")]
    Enqueue {
        /// Broker-supplied failure description.
        reason: String,
    },

    /// The consumer could not be started or has stopped.
    #[error("queue consumer unavailable: {reason}")]
    Consumer {
        /// Broker-supplied failure description.
        reason: String,
    },
}

/// Produces a derived static artifact at a target path.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Generate the artifact at `target`. On success the file exists and is
    /// complete; a failure must not leave a partial file behind.
    async fn generate(&self, target: &Path) -> Result<(), ArtifactError>;
}

/// Message broker used by queued publishing. The disabled path never calls
/// either operation.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Connect to the broker.
    async fn connect(&self) -> Result<(), DependencyError>;

    /// Start the consumer that drains publish jobs. Called once after a
    /// successful connect.
    async fn start_consumer(&self) -> Result<(), QueueError>;

    /// Enqueue a publish job for asynchronous processing.
    async fn enqueue(&self, job: PublishJob) -> Result<(), QueueError>;
}

/// Recurring background job runner. `setup_and_start` is idempotent: a
/// second call is a no-op success.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register and start the recurring jobs.
    async fn setup_and_start(&self) -> Result<(), StartError>;
}

/// Filesystem monitor for the site content directories.
#[async_trait]
pub trait FileWatcher: Send + Sync {
    /// Start monitoring. Runs until the process exits.
    async fn start(&self) -> Result<(), StartError>;
}
