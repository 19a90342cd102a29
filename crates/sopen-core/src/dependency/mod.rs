//! Startup dependency policy: fatal vs. advisory connections.
//!
//! Each external service the boot sequencer connects to is described by a
//! [`DependencySpec`] whose criticality is fixed at configuration time:
//!
//! - **Fatal**: the boot sequencer awaits the connection synchronously under
//!   a bounded timeout ([`connect_fatal`]); failure aborts the whole boot.
//! - **Advisory**: the connection is dispatched as an explicit background
//!   task ([`spawn_advisory`]) whose outcome is observed through the returned
//!   handle and recorded in [`DependencyHealth`], never left as an
//!   unobserved rejection. Failure degrades the capability and the service
//!   continues.
//!
//! Handlers that depend on an advisory capability must consult
//! [`DependencyHealth`] at call time: advisory connects may complete before
//! or after the listener binds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Whether a dependency failure aborts boot or merely degrades the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Failure aborts the entire boot sequence.
    Fatal,
    /// Failure is logged with a category code; the service continues with
    /// the capability unavailable.
    Advisory,
}

/// Description of one external startup dependency. Exactly one spec exists
/// per external service; criticality does not change at runtime.
#[derive(Debug, Clone, Copy)]
pub struct DependencySpec {
    /// Dependency name, used in logs and error messages.
    pub name: &'static str,
    /// Fixed criticality classification.
    pub criticality: Criticality,
}

/// Errors from dependency connection attempts.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The service could not be reached.
    #[error("{name} unreachable: {reason}")]
    Unreachable {
        /// Dependency name.
        name: &'static str,
        /// Underlying failure description.
        reason: String,
    },

    /// The bounded connection attempt did not complete in time.
    #[error("{name} connection attempt timed out after {timeout:?}")]
    Timeout {
        /// Dependency name.
        name: &'static str,
        /// The configured bound.
        timeout: Duration,
    },

    /// The subsystem is configured but administratively disabled; no
    /// connection may be attempted.
    #[error("{subsystem} is administratively disabled")]
    Disabled {
        /// Disabled subsystem name.
        subsystem: &'static str,
    },
}

/// One connectable external service.
#[async_trait]
pub trait Dependency: Send + Sync {
    /// The dependency's fixed spec.
    fn spec(&self) -> DependencySpec;

    /// Establish the connection.
    async fn connect(&self) -> Result<(), DependencyError>;
}

/// Advisory capabilities tracked in [`DependencyHealth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Response/content cache.
    Cache,
    /// Publish queue.
    Queue,
}

/// Per-capability availability, checked by handlers at call time.
///
/// Advisory connects flip these flags from their default `false` when they
/// complete; a handler must never assume boot-time completion. Flags use
/// relaxed ordering: each is an independent boolean with no cross-flag
/// ordering requirement.
#[derive(Debug, Default)]
pub struct DependencyHealth {
    cache: AtomicBool,
    queue: AtomicBool,
}

impl DependencyHealth {
    /// New health map with every capability unavailable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a capability available.
    pub fn mark_available(&self, capability: Capability) {
        self.flag(capability).store(true, Ordering::Relaxed);
    }

    /// Mark a capability unavailable.
    pub fn mark_unavailable(&self, capability: Capability) {
        self.flag(capability).store(false, Ordering::Relaxed);
    }

    /// Whether a capability is currently available.
    #[must_use]
    pub fn is_available(&self, capability: Capability) -> bool {
        self.flag(capability).load(Ordering::Relaxed)
    }

    const fn flag(&self, capability: Capability) -> &AtomicBool {
        match capability {
            Capability::Cache => &self.cache,
            Capability::Queue => &self.queue,
        }
    }
}

/// Handle to a dispatched advisory connection attempt.
///
/// The spawned task has already logged and recorded its outcome by the time
/// it finishes; joining is only needed by callers (tests, shutdown paths)
/// that want the result itself.
pub struct AdvisoryHandle {
    /// Name of the dependency the task is connecting.
    pub name: &'static str,
    handle: JoinHandle<Result<(), DependencyError>>,
}

impl AdvisoryHandle {
    /// Await the connection task and return its outcome.
    ///
    /// # Errors
    ///
    /// Returns the connection error, or `Unreachable` if the task panicked.
    pub async fn join(self) -> Result<(), DependencyError> {
        match self.handle.await {
            Ok(result) => result,
            Err(join_error) => Err(DependencyError::Unreachable {
                name: self.name,
                reason: format!("connection task failed: {join_error}"),
            }),
        }
    }
}

/// Await a fatal dependency's connection under a bounded timeout.
///
/// This is the sole operation the boot sequencer suspends on synchronously.
/// A hang past `timeout` fails boot fast instead of blocking indefinitely.
///
/// # Errors
///
/// Returns the connection error, or `Timeout` when the bound elapses first.
pub async fn connect_fatal(
    dep: &dyn Dependency,
    timeout: Duration,
) -> Result<(), DependencyError> {
    let spec = dep.spec();
    match tokio::time::timeout(timeout, dep.connect()).await {
        Ok(result) => result,
        Err(_elapsed) => Err(DependencyError::Timeout {
            name: spec.name,
            timeout,
        }),
    }
}

/// Dispatch an advisory dependency connection without blocking boot.
///
/// The task records its outcome in `health` and logs failure with the given
/// category `code`. Boot proceeds immediately; the returned handle lets
/// callers observe completion.
pub fn spawn_advisory(
    dep: Arc<dyn Dependency>,
    capability: Capability,
    health: Arc<DependencyHealth>,
    code: &'static str,
) -> AdvisoryHandle {
    let spec = dep.spec();
    let handle = tokio::spawn(async move {
        match dep.connect().await {
            Ok(()) => {
                health.mark_available(capability);
                info!(dependency = spec.name, "advisory dependency connected");
                Ok(())
            },
            Err(error) => {
                health.mark_unavailable(capability);
                warn!(
                    code,
                    dependency = spec.name,
                    error = %error,
                    "advisory dependency unavailable; service continues degraded"
                );
                Err(error)
            },
        }
    });
    AdvisoryHandle {
        name: spec.name,
        handle,
    }
}

/// Emit the operator-visible notice for an administratively disabled
/// subsystem. The connection is not attempted; the notice names the
/// subsystem and the resulting fallback behavior.
pub fn announce_disabled(code: &'static str, subsystem: &'static str, fallback: &str) {
    info!(
        code,
        subsystem, fallback, "subsystem administratively disabled; connection not attempted"
    );
}
