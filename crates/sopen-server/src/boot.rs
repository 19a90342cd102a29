//! Boot sequencer: ordered startup of dependencies, routes, background
//! processes, and the listener.
//!
//! The sequence is fixed: fatal datastore connect (the sole synchronous
//! suspend point, bounded by the configured timeout), then advisory
//! dispatches (cache; queue only when enabled), then route mounting, then
//! scheduler and watcher (advisory), then listener bind. Any fatal failure
//! transitions the boot state to `Failed` and propagates to the binary,
//! which terminates with a non-zero status. Advisory failures are logged
//! with their category codes and never reach this function's error path.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sopen_core::artifact::ArtifactGuard;
use sopen_core::auth::AuthProvider;
use sopen_core::boot::{BootError, BootPhase, BootState};
use sopen_core::codes;
use sopen_core::collaborators::{ArtifactGenerator, FileWatcher, QueueClient, Scheduler};
use sopen_core::config::ServiceConfig;
use sopen_core::dependency::{
    AdvisoryHandle, Capability, Dependency, DependencyHealth, announce_disabled, connect_fatal,
    spawn_advisory,
};
use sopen_core::publish::{Publisher, select_publish_mode};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::context::ServiceContext;
use crate::metrics::ServerMetrics;
use crate::routes;

/// External collaborators handed to the sequencer. The binary wires the
/// real implementations; integration tests wire stubs.
pub struct Collaborators {
    /// Primary datastore (fatal).
    pub datastore: Arc<dyn Dependency>,
    /// Cache (advisory).
    pub cache: Arc<dyn Dependency>,
    /// Queue client; `None` when the subsystem is disabled or unconfigured.
    pub queue: Option<Arc<dyn QueueClient>>,
    /// Recurring job runner (advisory).
    pub scheduler: Arc<dyn Scheduler>,
    /// Pages watcher (advisory).
    pub watcher: Arc<dyn FileWatcher>,
    /// Homepage generator.
    pub generator: Arc<dyn ArtifactGenerator>,
}

/// A fully booted server: context assembled, routes mounted, listener bound.
pub struct PreparedServer {
    context: Arc<ServiceContext>,
    listener: TcpListener,
    router: Router,
}

impl PreparedServer {
    /// The immutable boot context.
    #[must_use]
    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    /// The bound listener address.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the socket has gone away.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve requests until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error from the accept loop.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Run the boot sequence up to a bound listener.
///
/// # Errors
///
/// Returns a [`BootError`] on any fatal failure: datastore connect failure
/// or timeout, listener bind failure, or a wiring mismatch. The caller
/// terminates the process with a non-zero status.
pub async fn prepare(
    config: ServiceConfig,
    collaborators: Collaborators,
    metrics: ServerMetrics,
) -> Result<PreparedServer, BootError> {
    let config = Arc::new(config);
    let mut state = BootState::new();

    for warning in config.sanity_warnings() {
        warn!(code = codes::CONFIG_CHECK, %warning, "configuration sanity check");
    }

    // Phase: fatal datastore connect. The only synchronous suspend point.
    state.advance(BootPhase::ConnectingPrimary)?;
    let datastore_spec = collaborators.datastore.spec();
    info!(
        dependency = datastore_spec.name,
        timeout = ?config.datastore.connect_timeout,
        "connecting primary datastore"
    );
    if let Err(source) = connect_fatal(
        collaborators.datastore.as_ref(),
        config.datastore.connect_timeout,
    )
    .await
    {
        state.fail(datastore_spec.name, &source);
        error!(
            code = codes::DATASTORE_CONNECT,
            dependency = datastore_spec.name,
            error = %source,
            phase = ?state.phase(),
            "fatal dependency failed; aborting boot"
        );
        return Err(BootError::Dependency {
            name: datastore_spec.name,
            source,
        });
    }
    info!(dependency = datastore_spec.name, "primary datastore connected");

    // Phase: advisory dispatches. Fire-and-forget tasks; boot does not wait.
    state.advance(BootPhase::ConnectingAuxiliary)?;
    let health = Arc::new(DependencyHealth::new());

    if config.cache.enabled {
        let handle = spawn_advisory(
            Arc::clone(&collaborators.cache),
            Capability::Cache,
            Arc::clone(&health),
            codes::CACHE_UNAVAILABLE,
        );
        observe_advisory(handle, metrics.clone());
    } else {
        announce_disabled(
            codes::CACHE_DISABLED,
            "cache",
            "responses are served without caching",
        );
    }

    if config.queue.is_administratively_disabled() {
        announce_disabled(
            codes::QUEUE_DISABLED,
            "queue",
            "publishing runs synchronously (direct mode)",
        );
    }
    let queue = match (config.queue.is_active(), collaborators.queue) {
        (true, Some(queue)) => Some(queue),
        (true, None) => {
            warn!(
                code = codes::QUEUE_UNAVAILABLE,
                "queue enabled in configuration but no client wired; \
                 falling back to direct publishing"
            );
            None
        },
        (false, _) => None,
    };
    let publish_mode = select_publish_mode(queue.is_some());
    if let Some(queue_client) = queue.clone() {
        start_queue(queue_client, Arc::clone(&health), metrics.clone());
    }

    // Auth provider: computed once here, stored in the immutable context.
    let auth = init_auth(&config);

    let publisher = Publisher::new(
        publish_mode,
        queue,
        Arc::clone(&collaborators.generator),
        config.site.homepage_path(),
    )
    .map_err(|publish_error| BootError::Wiring {
        reason: publish_error.to_string(),
    })?;

    // Phase: mount the HTTP surface.
    state.advance(BootPhase::MountingRoutes)?;
    let context = Arc::new(ServiceContext::new(
        Arc::clone(&config),
        publish_mode,
        health,
        ArtifactGuard::new(config.site.homepage_path()),
        Arc::clone(&collaborators.generator),
        publisher,
        auth,
        metrics.clone(),
    ));
    let router = routes::router(Arc::clone(&context));

    // Phase: background processes. Advisory: start failures are logged and
    // never block the listener.
    state.advance(BootPhase::StartingBackground)?;
    if let Err(start_error) = collaborators.scheduler.setup_and_start().await {
        metrics.dependency_failure("scheduler");
        warn!(
            code = codes::SCHEDULER_START,
            error = %start_error,
            "scheduler failed to start; recurring jobs disabled"
        );
    }
    if let Err(start_error) = collaborators.watcher.start().await {
        metrics.dependency_failure("watcher");
        warn!(
            code = codes::WATCHER_START,
            error = %start_error,
            "file watcher failed to start; filesystem monitoring disabled"
        );
    }

    // Phase: bind the listener.
    let bind_addr = config.server.bind_addr();
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(source) => {
            state.fail("listener", &source);
            error!(
                code = codes::BOOT_FAIL,
                addr = %bind_addr,
                error = %source,
                "listener bind failed; aborting boot"
            );
            return Err(BootError::Listener {
                addr: bind_addr,
                source,
            });
        },
    };
    state.advance(BootPhase::Listening)?;
    let port = listener
        .local_addr()
        .map_or(config.server.port, |addr| addr.port());
    info!(
        hostname = %config.server.hostname,
        port,
        mode = %publish_mode,
        "server listening"
    );

    // Boot bookkeeping is complete; the state is discarded here.
    drop(state);

    Ok(PreparedServer {
        context,
        listener,
        router,
    })
}

/// Observe an advisory connect task's outcome for metrics. The task itself
/// already logged; this only records the failure counter.
fn observe_advisory(handle: AdvisoryHandle, metrics: ServerMetrics) {
    tokio::spawn(async move {
        let name = handle.name;
        if handle.join().await.is_err() {
            metrics.dependency_failure(name);
        }
    });
}

/// Connect the queue and start its consumer as one advisory background
/// task. The publish mode was already fixed; a failure here means queued
/// publishes will fail at enqueue time until the process restarts.
fn start_queue(
    queue: Arc<dyn QueueClient>,
    health: Arc<DependencyHealth>,
    metrics: ServerMetrics,
) {
    tokio::spawn(async move {
        match queue.connect().await {
            Ok(()) => match queue.start_consumer().await {
                Ok(()) => {
                    health.mark_available(Capability::Queue);
                    info!(dependency = "queue", "queue connected and consumer started");
                },
                Err(consumer_error) => {
                    metrics.dependency_failure("queue");
                    warn!(
                        code = codes::QUEUE_UNAVAILABLE,
                        error = %consumer_error,
                        "queue consumer failed to start; queued publishes will fail"
                    );
                },
            },
            Err(connect_error) => {
                metrics.dependency_failure("queue");
                warn!(
                    code = codes::QUEUE_UNAVAILABLE,
                    error = %connect_error,
                    "queue unreachable; queued publishes will fail"
                );
            },
        }
    });
}

/// Initialize the auth provider from the configured credential blob.
/// Absence disables auth features (advisory); a malformed blob is fatal for
/// the auth subsystem only and never aborts boot.
fn init_auth(config: &ServiceConfig) -> Option<AuthProvider> {
    match config.auth.credentials_json.as_deref() {
        Some(blob) => match AuthProvider::from_credentials_json(blob) {
            Ok(provider) => {
                info!(project = provider.project_id(), "auth provider initialized");
                Some(provider)
            },
            Err(auth_error) => {
                error!(
                    code = codes::AUTH_INIT,
                    error = %auth_error,
                    "auth provider initialization failed; auth features disabled"
                );
                None
            },
        },
        None => {
            warn!(
                code = codes::AUTH_DISABLED,
                "auth credentials absent; auth features disabled"
            );
            None
        },
    }
}
