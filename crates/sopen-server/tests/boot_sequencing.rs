//! Boot sequencing: fatal vs. advisory dependency failures.
//!
//! Acceptance criteria:
//!
//! 1. A fatal datastore failure aborts boot before any route mount or
//!    background start, and the sequencer returns the fatal error the
//!    binary turns into a non-zero exit.
//! 2. The fatal connect is bounded: a hanging datastore fails boot at the
//!    configured timeout instead of blocking forever.
//! 3. Advisory failures (cache, scheduler, watcher) never prevent the
//!    listener from binding or the root route from being reachable.

use std::sync::atomic::Ordering;
use std::time::Duration;

use sopen_core::boot::BootError;
use sopen_core::dependency::{Criticality, DependencyError};
use sopen_server::boot::{self, Collaborators};
use sopen_server::metrics::ServerMetrics;
use tempfile::TempDir;

mod common;
use common::{
    StubDependency, StubGenerator, StubScheduler, StubWatcher, get_request, healthy_collaborators,
    http_request, spawn_server, test_config,
};

#[tokio::test]
async fn fatal_datastore_failure_aborts_before_any_mount() {
    let temp = TempDir::new().expect("create temp dir");
    let config = test_config(&temp);

    let datastore = StubDependency::failing("datastore", Criticality::Fatal);
    let generator = StubGenerator::succeeding();
    let scheduler = StubScheduler::ok();
    let watcher = StubWatcher::ok();
    let collaborators = Collaborators {
        datastore: datastore.clone(),
        scheduler: scheduler.clone(),
        watcher: watcher.clone(),
        ..healthy_collaborators(generator.clone())
    };

    let metrics = ServerMetrics::new().expect("metrics registry");
    let error = match boot::prepare(config, collaborators, metrics).await {
        Ok(_) => panic!("fatal datastore failure must abort boot"),
        Err(error) => error,
    };

    match error {
        BootError::Dependency {
            name: "datastore",
            source: DependencyError::Unreachable { .. },
        } => {},
        other => panic!("expected fatal datastore error, got {other:?}"),
    }
    assert_eq!(datastore.attempts(), 1);
    assert_eq!(generator.calls(), 0, "no artifact work before routes");
    assert!(
        !scheduler.started.load(Ordering::SeqCst),
        "background must not start after a fatal failure"
    );
    assert!(!watcher.started.load(Ordering::SeqCst));
}

#[tokio::test]
async fn hanging_datastore_fails_fast_at_the_configured_bound() {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = test_config(&temp);
    config.datastore.connect_timeout = Duration::from_millis(100);

    let collaborators = Collaborators {
        datastore: StubDependency::slow("datastore", Criticality::Fatal, Duration::from_secs(60)),
        ..healthy_collaborators(StubGenerator::succeeding())
    };

    let metrics = ServerMetrics::new().expect("metrics registry");
    let started = std::time::Instant::now();
    let error = match boot::prepare(config, collaborators, metrics).await {
        Ok(_) => panic!("hanging datastore must abort boot"),
        Err(error) => error,
    };
    let elapsed = started.elapsed();

    match error {
        BootError::Dependency {
            name: "datastore",
            source: DependencyError::Timeout { timeout, .. },
        } => assert_eq!(timeout, Duration::from_millis(100)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(
        elapsed < Duration::from_secs(10),
        "boot must fail fast, took {elapsed:?}"
    );
}

#[tokio::test]
async fn advisory_cache_failure_still_binds_and_serves() {
    let temp = TempDir::new().expect("create temp dir");
    let config = test_config(&temp);

    let generator = StubGenerator::succeeding();
    let collaborators = Collaborators {
        cache: StubDependency::failing("cache", Criticality::Advisory),
        ..healthy_collaborators(generator.clone())
    };

    let metrics = ServerMetrics::new().expect("metrics registry");
    let prepared = boot::prepare(config, collaborators, metrics)
        .await
        .expect("advisory failure must not abort boot");
    let server = spawn_server(prepared);

    let health = http_request(server.port, &get_request("/api/health")).await;
    assert!(health.starts_with("HTTP/1.1 200"), "got: {health}");
    assert!(health.contains("\"cache_available\":false"));

    let root = http_request(server.port, &get_request("/")).await;
    assert!(root.starts_with("HTTP/1.1 200"), "root route must still serve");

    server.stop().await;
}

#[tokio::test]
async fn scheduler_and_watcher_failures_do_not_block_listening() {
    let temp = TempDir::new().expect("create temp dir");
    let config = test_config(&temp);

    let collaborators = Collaborators {
        scheduler: StubScheduler::failing(),
        watcher: StubWatcher::failing(),
        ..healthy_collaborators(StubGenerator::succeeding())
    };

    let metrics = ServerMetrics::new().expect("metrics registry");
    let prepared = boot::prepare(config, collaborators, metrics)
        .await
        .expect("background start failures are advisory");
    let server = spawn_server(prepared);

    let response = http_request(server.port, &get_request("/api/health")).await;
    assert!(response.starts_with("HTTP/1.1 200"));

    server.stop().await;
}

#[tokio::test]
async fn listener_bind_conflict_is_fatal() {
    let temp = TempDir::new().expect("create temp dir");
    let occupant = tokio::net::TcpListener::bind("0.0.0.0:0")
        .await
        .expect("bind occupant listener");
    let taken_port = occupant.local_addr().expect("occupant addr").port();

    let mut config = test_config(&temp);
    config.server.port = taken_port;

    let collaborators = healthy_collaborators(StubGenerator::succeeding());
    let metrics = ServerMetrics::new().expect("metrics registry");
    let error = match boot::prepare(config, collaborators, metrics).await {
        Ok(_) => panic!("a taken port must abort boot"),
        Err(error) => error,
    };

    match error {
        BootError::Listener { addr, .. } => {
            assert!(addr.ends_with(&taken_port.to_string()));
        },
        other => panic!("expected listener bind failure, got {other:?}"),
    }
}
