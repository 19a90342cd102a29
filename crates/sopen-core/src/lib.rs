//! Core orchestration policy for the Sopen publishing service.
//!
//! This crate holds the decision logic that the server binary wires together:
//!
//! - **Dependency criticality** ([`dependency`]): which startup dependencies
//!   are fatal (abort boot) and which are advisory (log, degrade, continue),
//!   including the bounded-timeout fatal connect and the fire-and-forget
//!   advisory connect whose outcome is observed through an explicit task
//!   handle rather than an unobserved rejection.
//! - **Degraded-mode publishing** ([`publish`]): the once-at-boot choice
//!   between queue-mediated asynchronous publishing and synchronous direct
//!   publishing, with both paths fully implemented.
//! - **Artifact guard** ([`artifact`]): the lazy generate-then-serve policy
//!   for derived static files, serialized per path so concurrent first
//!   requests trigger at most one generation.
//! - **Boot state machine** ([`boot`]): strictly-forward phase tracking with
//!   a terminal `Failed` phase and the fatal error taxonomy.
//!
//! External collaborators (datastore, cache, queue, scheduler, watcher,
//! generator) are expressed as traits in [`collaborators`] and
//! [`dependency`]; their internals live in the server crate or outside the
//! system entirely.

pub mod artifact;
pub mod auth;
pub mod boot;
pub mod codes;
pub mod collaborators;
pub mod config;
pub mod dependency;
pub mod publish;
