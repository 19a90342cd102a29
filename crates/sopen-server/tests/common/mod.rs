//! Shared stubs and helpers for the boot-sequence integration tests.
//!
//! Each test boots the real sequencer against stub collaborators and a real
//! listener on an ephemeral port, then speaks plain HTTP/1.1 over a TCP
//! socket; the listener-binding property is part of what the tests assert.
#![allow(dead_code)] // each test binary uses a different subset

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sopen_core::collaborators::{
    ArtifactError, ArtifactGenerator, FileWatcher, QueueClient, QueueError, Scheduler, StartError,
};
use sopen_core::config::ServiceConfig;
use sopen_core::dependency::{Criticality, Dependency, DependencyError, DependencySpec};
use sopen_core::publish::PublishJob;
use sopen_server::boot::{Collaborators, PreparedServer};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Test configuration: ephemeral port, content dirs under `temp`, and
/// background cadences long enough to never fire during a test.
pub fn test_config(temp: &TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::from_toml("").expect("empty config parses");
    config.server.port = 0;
    config.site.pages_dir = temp.path().join("pages");
    config.site.assets_dir = temp.path().join("assets");
    config.scheduler.refresh_interval = Duration::from_secs(3600);
    config.site.watch_interval = Duration::from_secs(3600);
    std::fs::create_dir_all(&config.site.pages_dir).expect("create pages dir");
    std::fs::create_dir_all(&config.site.assets_dir).expect("create assets dir");
    config
}

/// Connectable stub dependency.
pub struct StubDependency {
    spec: DependencySpec,
    fail: bool,
    delay: Duration,
    attempts: Arc<AtomicUsize>,
}

impl StubDependency {
    pub fn ok(name: &'static str, criticality: Criticality) -> Arc<Self> {
        Arc::new(Self {
            spec: DependencySpec { name, criticality },
            fail: false,
            delay: Duration::ZERO,
            attempts: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing(name: &'static str, criticality: Criticality) -> Arc<Self> {
        Arc::new(Self {
            spec: DependencySpec { name, criticality },
            fail: true,
            delay: Duration::ZERO,
            attempts: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn slow(name: &'static str, criticality: Criticality, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            spec: DependencySpec { name, criticality },
            fail: false,
            delay,
            attempts: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dependency for StubDependency {
    fn spec(&self) -> DependencySpec {
        self.spec
    }

    async fn connect(&self) -> Result<(), DependencyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            Err(DependencyError::Unreachable {
                name: self.spec.name,
                reason: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Generator stub that counts invocations and writes a fixed page.
pub struct StubGenerator {
    calls: Arc<AtomicUsize>,
    succeed: bool,
    delay: Duration,
}

impl StubGenerator {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(AtomicUsize::new(0)),
            succeed: true,
            delay: Duration::ZERO,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(AtomicUsize::new(0)),
            succeed: false,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(AtomicUsize::new(0)),
            succeed: true,
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactGenerator for StubGenerator {
    async fn generate(&self, target: &Path) -> Result<(), ArtifactError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.succeed {
            tokio::fs::write(target, b"<html>stub homepage</html>").await?;
            Ok(())
        } else {
            Err(ArtifactError::Failed {
                reason: "renderer unavailable".to_string(),
            })
        }
    }
}

/// Scheduler stub recording whether it started, optionally failing.
pub struct StubScheduler {
    pub started: Arc<AtomicBool>,
    fail: bool,
}

impl StubScheduler {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            started: Arc::new(AtomicBool::new(false)),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            started: Arc::new(AtomicBool::new(false)),
            fail: true,
        })
    }
}

#[async_trait]
impl Scheduler for StubScheduler {
    async fn setup_and_start(&self) -> Result<(), StartError> {
        if self.fail {
            return Err(StartError::Unavailable {
                reason: "scheduler broken".to_string(),
            });
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Watcher stub recording whether it started, optionally failing.
pub struct StubWatcher {
    pub started: Arc<AtomicBool>,
    fail: bool,
}

impl StubWatcher {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            started: Arc::new(AtomicBool::new(false)),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            started: Arc::new(AtomicBool::new(false)),
            fail: true,
        })
    }
}

#[async_trait]
impl FileWatcher for StubWatcher {
    async fn start(&self) -> Result<(), StartError> {
        if self.fail {
            return Err(StartError::Unavailable {
                reason: "watcher broken".to_string(),
            });
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Queue stub recording enqueues and consumer starts.
pub struct RecordingQueue {
    pub enqueued: Arc<AtomicUsize>,
    pub consumer_started: Arc<AtomicBool>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            enqueued: Arc::new(AtomicUsize::new(0)),
            consumer_started: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl QueueClient for RecordingQueue {
    async fn connect(&self) -> Result<(), DependencyError> {
        Ok(())
    }

    async fn start_consumer(&self) -> Result<(), QueueError> {
        self.consumer_started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn enqueue(&self, _job: PublishJob) -> Result<(), QueueError> {
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Collaborator set with healthy defaults; tests override the pieces under
/// test.
pub fn healthy_collaborators(generator: Arc<StubGenerator>) -> Collaborators {
    Collaborators {
        datastore: StubDependency::ok("datastore", Criticality::Fatal),
        cache: StubDependency::ok("cache", Criticality::Advisory),
        queue: None,
        scheduler: StubScheduler::ok(),
        watcher: StubWatcher::ok(),
        generator,
    }
}

/// A served boot result: the listener stays live until `stop`.
pub struct RunningServer {
    pub port: u16,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// Serve a prepared server in the background.
pub fn spawn_server(prepared: PreparedServer) -> RunningServer {
    let port = prepared.local_addr().expect("listener has an address").port();
    let (shutdown, rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(prepared.serve(async move {
        let _ = rx.await;
    }));
    RunningServer {
        port,
        shutdown,
        handle,
    }
}

/// Send a raw HTTP/1.1 request and return the full response text.
pub async fn http_request(port: u16, raw: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port))
        .await
        .expect("connect to server");
    stream
        .write_all(raw.as_bytes())
        .await
        .expect("write request");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    String::from_utf8_lossy(&response).into_owned()
}

pub fn get_request(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

pub fn post_json_request(path: &str, bearer: Option<&str>, body: &str) -> String {
    let auth = bearer
        .map(|token| format!("Authorization: Bearer {token}\r\n"))
        .unwrap_or_default();
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\n{auth}Content-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
