//! Prometheus metrics for service health observability.
//!
//! A compact registry covering the three things operators page on: publish
//! throughput by mode, artifact generation outcomes, and advisory dependency
//! failures. Exposed in Prometheus text format at `GET /metrics` on the main
//! router.
//!
//! All metrics use interior mutability; the struct is `Clone`, `Send`, and
//! `Sync` and is shared through the service context.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use sopen_core::publish::PublishMode;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to register a metric with Prometheus.
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    /// Failed to encode metrics output.
    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

/// Service metrics, registered against one Prometheus registry.
#[derive(Clone)]
pub struct ServerMetrics {
    registry: Registry,

    /// Publish requests executed, labeled by mode (`queued` / `direct`).
    publishes_total: IntCounterVec,

    /// Artifact generation attempts, labeled by outcome
    /// (`success` / `failure`).
    artifact_generations_total: IntCounterVec,

    /// Advisory dependency failures, labeled by dependency name.
    dependency_failures_total: IntCounterVec,
}

impl ServerMetrics {
    /// Create the registry and register all metric families.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g. duplicate
    /// name).
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let publishes_total = IntCounterVec::new(
            Opts::new("sopen_publishes_total", "Publish requests executed"),
            &["mode"],
        )?;
        registry.register(Box::new(publishes_total.clone()))?;

        let artifact_generations_total = IntCounterVec::new(
            Opts::new(
                "sopen_artifact_generations_total",
                "Artifact generation attempts",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(artifact_generations_total.clone()))?;

        let dependency_failures_total = IntCounterVec::new(
            Opts::new(
                "sopen_dependency_failures_total",
                "Advisory dependency failures",
            ),
            &["dependency"],
        )?;
        registry.register(Box::new(dependency_failures_total.clone()))?;

        Ok(Self {
            registry,
            publishes_total,
            artifact_generations_total,
            dependency_failures_total,
        })
    }

    /// Record one executed publish request.
    pub fn publish_recorded(&self, mode: PublishMode) {
        let mode = mode.to_string();
        self.publishes_total.with_label_values(&[&mode]).inc();
    }

    /// Record one artifact generation attempt (`"success"` / `"failure"`).
    pub fn artifact_generation(&self, outcome: &str) {
        self.artifact_generations_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record one advisory dependency failure.
    pub fn dependency_failure(&self, dependency: &str) {
        self.dependency_failures_total
            .with_label_values(&[dependency])
            .inc();
    }

    /// Export the registry in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|error| MetricsError::EncodingFailed(error.to_string()))?;
        String::from_utf8(buffer).map_err(|error| MetricsError::EncodingFailed(error.to_string()))
    }
}
