//! Immutable service context shared with every handler.
//!
//! The boot sequencer produces one [`ServiceContext`] and hands it to the
//! router as shared state. It replaces the module-level mutable flags the
//! naive design would use ("is auth initialized", "current publish mode"):
//! everything here is decided once at boot and read-only afterwards, except
//! [`DependencyHealth`], whose flags are flipped by the advisory connect
//! tasks and consulted by handlers at call time.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sopen_core::artifact::ArtifactGuard;
use sopen_core::auth::AuthProvider;
use sopen_core::collaborators::ArtifactGenerator;
use sopen_core::config::ServiceConfig;
use sopen_core::dependency::DependencyHealth;
use sopen_core::publish::{PublishMode, Publisher};

use crate::metrics::ServerMetrics;

/// Boot-time wiring result, shared by reference with all consumers.
pub struct ServiceContext {
    /// Loaded configuration.
    pub config: Arc<ServiceConfig>,

    /// Publish mode selected at boot; invariant for the process lifetime.
    pub publish_mode: PublishMode,

    /// Advisory capability availability, checked at call time.
    pub health: Arc<DependencyHealth>,

    /// Guard for the lazily generated homepage artifact.
    pub artifact_guard: ArtifactGuard,

    /// Homepage/site generator collaborator.
    pub generator: Arc<dyn ArtifactGenerator>,

    /// Mode-aware publish executor.
    pub publisher: Publisher,

    /// Auth provider; `None` when credentials are absent or malformed
    /// (auth-gated features disabled).
    pub auth: Option<AuthProvider>,

    /// Service metrics registry.
    pub metrics: ServerMetrics,

    /// Wall-clock boot time, reported by the status endpoint.
    pub started_at: DateTime<Utc>,

    started: Instant,
}

impl ServiceContext {
    /// Assemble the context at the end of the wiring phase.
    #[must_use]
    #[allow(clippy::too_many_arguments)] // one-shot constructor called from boot only
    pub fn new(
        config: Arc<ServiceConfig>,
        publish_mode: PublishMode,
        health: Arc<DependencyHealth>,
        artifact_guard: ArtifactGuard,
        generator: Arc<dyn ArtifactGenerator>,
        publisher: Publisher,
        auth: Option<AuthProvider>,
        metrics: ServerMetrics,
    ) -> Self {
        Self {
            config,
            publish_mode,
            health,
            artifact_guard,
            generator,
            publisher,
            auth,
            metrics,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Seconds since boot.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
