//! Concrete collaborator implementations wired by the binary.
//!
//! The core crate defines the seams; this module supplies the in-tree
//! implementations: TCP reachability probes for the datastore and cache, an
//! in-process channel-backed queue, an interval scheduler, a poll-based
//! pages watcher, and the homepage generator. Driver-level protocol
//! handshakes, broker wire formats, and rendering pipelines stay behind
//! these types.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sopen_core::codes;
use sopen_core::collaborators::{
    ArtifactError, ArtifactGenerator, FileWatcher, QueueClient, QueueError, Scheduler, StartError,
};
use sopen_core::dependency::{Criticality, Dependency, DependencyError, DependencySpec};
use sopen_core::publish::PublishJob;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

use crate::fs_safe;
use crate::metrics::ServerMetrics;

/// Dependency that validates reachability with a TCP connect to the URI's
/// host and port. Protocol handshakes are the driver's business; the boot
/// sequencer only needs to know whether the service is there.
pub struct TcpProbeDependency {
    spec: DependencySpec,
    uri: String,
    default_port: u16,
}

impl TcpProbeDependency {
    /// Probe for the primary datastore (fatal).
    #[must_use]
    pub fn datastore(uri: impl Into<String>) -> Self {
        Self {
            spec: DependencySpec {
                name: "datastore",
                criticality: Criticality::Fatal,
            },
            uri: uri.into(),
            default_port: 27017,
        }
    }

    /// Probe for the cache (advisory).
    #[must_use]
    pub fn cache(uri: impl Into<String>) -> Self {
        Self {
            spec: DependencySpec {
                name: "cache",
                criticality: Criticality::Advisory,
            },
            uri: uri.into(),
            default_port: 6379,
        }
    }

    /// Resolve the URI to a host and port. Parsing happens at connect time
    /// so a malformed advisory URI degrades instead of failing construction.
    fn endpoint(&self) -> Result<(String, u16), DependencyError> {
        let url = Url::parse(&self.uri).map_err(|error| DependencyError::Unreachable {
            name: self.spec.name,
            reason: format!("invalid URI: {error}"),
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| DependencyError::Unreachable {
                name: self.spec.name,
                reason: "URI has no host".to_string(),
            })?
            .to_string();
        let port = url.port().unwrap_or(self.default_port);
        Ok((host, port))
    }
}

#[async_trait]
impl Dependency for TcpProbeDependency {
    fn spec(&self) -> DependencySpec {
        self.spec
    }

    async fn connect(&self) -> Result<(), DependencyError> {
        let (host, port) = self.endpoint()?;
        TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|error| DependencyError::Unreachable {
                name: self.spec.name,
                reason: format!("{host}:{port}: {error}"),
            })?;
        Ok(())
    }
}

/// Default depth of the in-process publish channel.
const QUEUE_DEPTH: usize = 64;

/// In-process channel-backed queue used when queued publishing is enabled.
///
/// `enqueue` sends onto a bounded channel; `start_consumer` spawns a worker
/// that drains jobs through the generator. Starting the consumer twice is a
/// no-op.
pub struct ChannelQueue {
    tx: mpsc::Sender<PublishJob>,
    rx: Mutex<Option<mpsc::Receiver<PublishJob>>>,
    generator: Arc<dyn ArtifactGenerator>,
    target: PathBuf,
}

impl ChannelQueue {
    /// Queue draining into `generator` against `target`.
    #[must_use]
    pub fn new(generator: Arc<dyn ArtifactGenerator>, target: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            generator,
            target,
        }
    }
}

#[async_trait]
impl QueueClient for ChannelQueue {
    async fn connect(&self) -> Result<(), DependencyError> {
        // In-process broker: nothing to reach.
        Ok(())
    }

    async fn start_consumer(&self) -> Result<(), QueueError> {
        let Some(mut rx) = self.rx.lock().await.take() else {
            return Ok(());
        };
        let generator = Arc::clone(&self.generator);
        let target = self.target.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match generator.generate(&target).await {
                    Ok(()) => debug!(note = ?job.note, "queued publish completed"),
                    Err(error) => warn!(
                        code = codes::ARTIFACT_GENERATE,
                        error = %error,
                        note = ?job.note,
                        "queued publish failed"
                    ),
                }
            }
        });
        Ok(())
    }

    async fn enqueue(&self, job: PublishJob) -> Result<(), QueueError> {
        self.tx.send(job).await.map_err(|_send| QueueError::Enqueue {
            reason: "consumer stopped; channel closed".to_string(),
        })
    }
}

/// Future type returned by a scheduled job closure.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Scheduled job closure.
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// One recurring job.
#[derive(Clone)]
pub struct ScheduledJob {
    name: &'static str,
    interval: Duration,
    run: JobFn,
}

impl ScheduledJob {
    /// Job `name` running `run` every `interval`.
    #[must_use]
    pub fn new(name: &'static str, interval: Duration, run: JobFn) -> Self {
        Self {
            name,
            interval,
            run,
        }
    }
}

/// Interval-based recurring job runner.
///
/// Each job runs in its own task, so a panicking or failing job is isolated:
/// the failure is logged and the schedule continues. `setup_and_start` is
/// idempotent.
pub struct IntervalScheduler {
    jobs: Vec<ScheduledJob>,
    started: AtomicBool,
}

impl IntervalScheduler {
    /// Scheduler over the given jobs.
    #[must_use]
    pub fn new(jobs: Vec<ScheduledJob>) -> Self {
        Self {
            jobs,
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn setup_and_start(&self) -> Result<(), StartError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for job in self.jobs.clone() {
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(job.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately; jobs run after a
                // full interval.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(reason) = (job.run)().await {
                        warn!(
                            code = codes::SCHEDULER_JOB,
                            job = job.name,
                            %reason,
                            "scheduled job failed; schedule continues"
                        );
                    }
                }
            });
        }
        info!(jobs = self.jobs.len(), "scheduler started");
        Ok(())
    }
}

/// What changed between two directory snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File appeared.
    Added,
    /// File modification time moved.
    Modified,
    /// File disappeared.
    Removed,
}

impl ChangeKind {
    /// Stable string for structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// One detected change.
#[derive(Debug)]
pub struct Change {
    /// Affected file.
    pub path: PathBuf,
    /// What happened to it.
    pub kind: ChangeKind,
}

/// Mtime snapshot of the regular files directly inside a directory.
fn snapshot_dir(dir: &Path) -> std::io::Result<BTreeMap<PathBuf, SystemTime>> {
    let mut snapshot = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            snapshot.insert(entry.path(), metadata.modified()?);
        }
    }
    Ok(snapshot)
}

/// Changes that took `old` to `new`.
fn diff_snapshots(
    old: &BTreeMap<PathBuf, SystemTime>,
    new: &BTreeMap<PathBuf, SystemTime>,
) -> Vec<Change> {
    let mut changes = Vec::new();
    for (path, modified) in new {
        match old.get(path) {
            None => changes.push(Change {
                path: path.clone(),
                kind: ChangeKind::Added,
            }),
            Some(previous) if previous != modified => changes.push(Change {
                path: path.clone(),
                kind: ChangeKind::Modified,
            }),
            Some(_) => {},
        }
    }
    for path in old.keys() {
        if !new.contains_key(path) {
            changes.push(Change {
                path: path.clone(),
                kind: ChangeKind::Removed,
            });
        }
    }
    changes
}

/// Poll-based watcher over the pages directory.
///
/// Scans file modification times on an interval and logs every change. A
/// failed scan keeps the previous snapshot and retries on the next tick.
pub struct PagesWatcher {
    dir: PathBuf,
    interval: Duration,
}

impl PagesWatcher {
    /// Watcher over `dir` polling every `interval`.
    #[must_use]
    pub fn new(dir: PathBuf, interval: Duration) -> Self {
        Self { dir, interval }
    }
}

#[async_trait]
impl FileWatcher for PagesWatcher {
    async fn start(&self) -> Result<(), StartError> {
        if !self.dir.is_dir() {
            return Err(StartError::Unavailable {
                reason: format!("watch directory {} does not exist", self.dir.display()),
            });
        }
        let dir = self.dir.clone();
        let interval = self.interval;
        let mut snapshot = snapshot_dir(&dir)?;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match snapshot_dir(&dir) {
                    Ok(current) => {
                        for change in diff_snapshots(&snapshot, &current) {
                            info!(
                                path = %change.path.display(),
                                kind = change.kind.as_str(),
                                "page content changed"
                            );
                        }
                        snapshot = current;
                    },
                    Err(error) => warn!(
                        code = codes::WATCHER_START,
                        error = %error,
                        "page scan failed; keeping previous snapshot"
                    ),
                }
            }
        });
        info!(dir = %self.dir.display(), "file watcher started");
        Ok(())
    }
}

/// Homepage generator: renders the index page and writes it atomically.
pub struct HtmlGenerator {
    hostname: String,
    metrics: ServerMetrics,
}

impl HtmlGenerator {
    /// Generator stamping pages with the public hostname.
    #[must_use]
    pub fn new(hostname: String, metrics: ServerMetrics) -> Self {
        Self { hostname, metrics }
    }

    fn render(&self) -> String {
        let generated_at = chrono::Utc::now().to_rfc3339();
        format!(
            "<!doctype html>\n\
             <html lang=\"en\">\n\
             <head><meta charset=\"utf-8\"><title>Sopen</title></head>\n\
             <body>\n\
             <h1>Sopen</h1>\n\
             <p>Served by {hostname}.</p>\n\
             <p>Generated {generated_at}.</p>\n\
             </body>\n\
             </html>\n",
            hostname = self.hostname,
        )
    }
}

#[async_trait]
impl ArtifactGenerator for HtmlGenerator {
    async fn generate(&self, target: &Path) -> Result<(), ArtifactError> {
        let html = self.render();
        let result = fs_safe::atomic_write(target, html.as_bytes()).map_err(ArtifactError::from);
        match &result {
            Ok(()) => self.metrics.artifact_generation("success"),
            Err(_) => self.metrics.artifact_generation("failure"),
        }
        result
    }
}
