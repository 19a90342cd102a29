//! HTTP surface: static mounts, route groups, dashboard, and the root route.
//!
//! Three API groups mount under distinct prefixes (public and
//! authenticated-user under `/api`, admin under `/api/admin`) plus static
//! mounts for assets and pages, a dashboard page served directly, and the
//! root route that runs the artifact guard. Handlers are deliberately thin:
//! route contracts beyond the mount points belong to the collaborators.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sopen_core::artifact::ArtifactStatus;
use sopen_core::codes;
use sopen_core::config::Environment;
use sopen_core::dependency::Capability;
use sopen_core::publish::{PublishError, PublishJob, PublishMode, PublishReceipt};
use tower_http::services::ServeDir;
use tracing::error;

use crate::context::ServiceContext;

/// Placeholder page for a homepage that is not yet generated. A transient
/// state, not an error: the client should retry.
const UNAVAILABLE_PLACEHOLDER: &str =
    "<h1>Sopen</h1><p>The system is initializing. Please try again shortly.</p>";

/// Build the full router over the immutable service context.
pub fn router(context: Arc<ServiceContext>) -> Router {
    let api = public_routes()
        .merge(user_routes())
        .nest("/admin", admin_routes());
    Router::new()
        .route("/", get(homepage))
        .route("/dashboard", get(dashboard))
        .route("/metrics", get(export_metrics))
        .nest("/api", api)
        .nest_service(
            "/assets",
            ServeDir::new(&context.config.site.assets_dir),
        )
        .nest_service("/pages", ServeDir::new(&context.config.site.pages_dir))
        .with_state(context)
}

/// Public group: no authentication.
fn public_routes() -> Router<Arc<ServiceContext>> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
}

/// Authenticated-user group.
fn user_routes() -> Router<Arc<ServiceContext>> {
    Router::new().route("/publish", post(publish))
}

/// Admin group.
fn admin_routes() -> Router<Arc<ServiceContext>> {
    Router::new().route("/regenerate", post(regenerate))
}

/// Root route: ensure the homepage artifact exists, then serve it. An
/// absent artifact (generation pending or failed) answers 503 with a
/// human-readable placeholder, never an error page.
async fn homepage(State(context): State<Arc<ServiceContext>>) -> Response {
    match context
        .artifact_guard
        .ensure(context.generator.as_ref())
        .await
    {
        ArtifactStatus::Ready => {
            match tokio::fs::read_to_string(context.artifact_guard.path()).await {
                Ok(html) => Html(html).into_response(),
                Err(read_error) => {
                    error!(
                        code = codes::ARTIFACT_GENERATE,
                        error = %read_error,
                        "homepage artifact vanished between existence check and read"
                    );
                    service_unavailable()
                },
            }
        },
        ArtifactStatus::Unavailable => service_unavailable(),
    }
}

fn service_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Html(UNAVAILABLE_PLACEHOLDER),
    )
        .into_response()
}

/// Dashboard page, served directly from the pages directory.
async fn dashboard(State(context): State<Arc<ServiceContext>>) -> Response {
    let path = context.config.site.dashboard_path();
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(_missing) => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    publish_mode: PublishMode,
    cache_available: bool,
    queue_available: bool,
    auth_enabled: bool,
}

/// Capability snapshot. Availability is read at call time: advisory
/// connects may complete after the listener bound.
async fn health(State(context): State<Arc<ServiceContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        publish_mode: context.publish_mode,
        cache_available: context.health.is_available(Capability::Cache),
        queue_available: context.health.is_available(Capability::Queue),
        auth_enabled: context.auth.is_some(),
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    hostname: String,
    environment: Environment,
    started_at: DateTime<Utc>,
    uptime_secs: u64,
}

async fn status(State(context): State<Arc<ServiceContext>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        hostname: context.config.server.hostname.clone(),
        environment: context.config.environment,
        started_at: context.started_at,
        uptime_secs: context.uptime_secs(),
    })
}

#[derive(Debug, Deserialize)]
struct PublishRequest {
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    receipt: PublishReceipt,
    mode: PublishMode,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Trigger a publish run. Executes according to the boot-time mode:
/// enqueued when queued, synchronously in this handler when direct.
async fn publish(
    State(context): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    Json(request): Json<PublishRequest>,
) -> Response {
    if let Err(rejection) = require_bearer(&context, &headers) {
        return rejection;
    }
    let job = PublishJob { note: request.note };

    match context.publisher.publish(job).await {
        Ok(receipt) => {
            context.metrics.publish_recorded(context.publish_mode);
            (
                StatusCode::OK,
                Json(PublishResponse {
                    receipt,
                    mode: context.publish_mode,
                }),
            )
                .into_response()
        },
        Err(publish_error @ PublishError::Queue(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error: publish_error.to_string(),
            }),
        )
            .into_response(),
        Err(publish_error) => {
            error!(
                code = codes::ARTIFACT_GENERATE,
                error = %publish_error,
                "publish failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: publish_error.to_string(),
                }),
            )
                .into_response()
        },
    }
}

/// Force a homepage regeneration, bypassing the guard's absence check.
async fn regenerate(State(context): State<Arc<ServiceContext>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = require_bearer(&context, &headers) {
        return rejection;
    }
    match context
        .generator
        .generate(context.artifact_guard.path())
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "regenerated" })),
        )
            .into_response(),
        Err(generate_error) => {
            error!(
                code = codes::ARTIFACT_GENERATE,
                error = %generate_error,
                "forced regeneration failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: generate_error.to_string(),
                }),
            )
                .into_response()
        },
    }
}

/// Gate for auth-required routes. With auth disabled (credentials absent or
/// malformed at boot) the whole feature is unavailable; with auth enabled,
/// the bearer token must at least be shaped like a provider token.
fn require_bearer(context: &ServiceContext, headers: &HeaderMap) -> Result<(), Response> {
    let Some(provider) = context.auth.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error: "authentication is disabled on this deployment".to_string(),
            }),
        )
            .into_response());
    };
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match token {
        Some(token) if provider.bearer_is_well_formed(token) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "missing or malformed bearer token".to_string(),
            }),
        )
            .into_response()),
    }
}

async fn export_metrics(State(context): State<Arc<ServiceContext>>) -> Response {
    match context.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(encode_error) => {
            error!("failed to encode metrics: {encode_error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {encode_error}"),
            )
                .into_response()
        },
    }
}
