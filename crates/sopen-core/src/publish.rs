//! Publish mode selection and the degraded-mode publisher.
//!
//! The mode is computed exactly once at boot from queue availability and is
//! immutable for the process lifetime: in-flight jobs never observe a mode
//! switch, and a queue that becomes reachable later does not silently
//! re-enable queued publishing. Both modes are real code paths:
//!
//! - `Queued`: publish requests are enqueued; an external consumer drains
//!   them asynchronously.
//! - `Direct`: publish requests run the generator synchronously in the
//!   request path. This trades throughput and backpressure isolation for
//!   startup simplicity and is announced once at boot as a documented
//!   degradation, not a silent fallback.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::codes;
use crate::collaborators::{ArtifactError, ArtifactGenerator, QueueClient, QueueError};

/// How publish requests are executed. Write-once at boot, read-many after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Requests are enqueued and processed asynchronously by a consumer.
    Queued,
    /// Requests execute synchronously in the request/handler path.
    Direct,
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

/// Select the publish mode from queue availability. Called once at boot;
/// the choice is announced here so the degradation is observable exactly
/// once, never per request.
#[must_use]
pub fn select_publish_mode(queue_enabled: bool) -> PublishMode {
    if queue_enabled {
        info!(mode = %PublishMode::Queued, "publish pipeline runs asynchronously through the queue");
        PublishMode::Queued
    } else {
        info!(
            code = codes::PUBLISH_DIRECT,
            mode = %PublishMode::Direct,
            "publishing runs synchronously in the request path; \
             throughput and backpressure isolation are reduced"
        );
        PublishMode::Direct
    }
}

/// One publish request.
#[derive(Debug, Clone, Default)]
pub struct PublishJob {
    /// Optional operator-supplied note carried through logs.
    pub note: Option<String>,
}

/// What happened to a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishReceipt {
    /// The job was enqueued; a consumer will process it.
    Enqueued,
    /// The job ran synchronously and the artifact was regenerated.
    Generated,
}

/// Errors from publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A queued-mode publisher was constructed without a queue client.
    #[error("queued publish mode requires a queue client")]
    QueueMissing,

    /// The queue rejected the job.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Direct-mode generation failed.
    #[error(transparent)]
    Generate(#[from] ArtifactError),
}

/// Executes publish requests according to the boot-time mode.
pub struct Publisher {
    mode: PublishMode,
    queue: Option<Arc<dyn QueueClient>>,
    generator: Arc<dyn ArtifactGenerator>,
    target: PathBuf,
}

impl Publisher {
    /// Build a publisher for the given mode.
    ///
    /// # Errors
    ///
    /// Returns `QueueMissing` if `mode` is `Queued` but no queue client was
    /// supplied; the mismatch is a wiring bug and must surface at boot, not
    /// on the first publish request.
    pub fn new(
        mode: PublishMode,
        queue: Option<Arc<dyn QueueClient>>,
        generator: Arc<dyn ArtifactGenerator>,
        target: PathBuf,
    ) -> Result<Self, PublishError> {
        if mode == PublishMode::Queued && queue.is_none() {
            return Err(PublishError::QueueMissing);
        }
        Ok(Self {
            mode,
            queue,
            generator,
            target,
        })
    }

    /// The mode selected at boot.
    #[must_use]
    pub const fn mode(&self) -> PublishMode {
        self.mode
    }

    /// Execute one publish request.
    ///
    /// # Errors
    ///
    /// Returns the queue or generation error; the caller decides how to
    /// surface it.
    pub async fn publish(&self, job: PublishJob) -> Result<PublishReceipt, PublishError> {
        match self.mode {
            PublishMode::Queued => {
                let queue = self.queue.as_ref().ok_or(PublishError::QueueMissing)?;
                queue.enqueue(job).await?;
                Ok(PublishReceipt::Enqueued)
            },
            PublishMode::Direct => {
                self.generator.generate(&self.target).await?;
                Ok(PublishReceipt::Generated)
            },
        }
    }
}
