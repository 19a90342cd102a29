//! Boot state machine and the fatal error taxonomy.
//!
//! [`BootState`] tracks the startup sequence through strictly-forward phases;
//! the only non-forward transition is to the terminal `Failed` phase, which
//! records the ordered failure sequence and triggers process exit in the
//! binary. The state is created once per process start and discarded after a
//! successful transition to `Listening`: it is bookkeeping for the boot
//! routine, not runtime state.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::dependency::DependencyError;

/// Phases of the boot sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootPhase {
    /// Process started, nothing attempted yet.
    NotStarted,
    /// Awaiting the fatal datastore connection.
    ConnectingPrimary,
    /// Dispatching advisory connections (cache, queue).
    ConnectingAuxiliary,
    /// Building and mounting the HTTP surface.
    MountingRoutes,
    /// Starting scheduler and watcher.
    StartingBackground,
    /// Listener bound; the service is up.
    Listening,
    /// Terminal failure; the process is exiting non-zero.
    Failed,
}

/// One recorded boot failure.
#[derive(Debug)]
pub struct BootFailure {
    /// Name of the dependency or subsystem that failed.
    pub name: String,
    /// Rendered error.
    pub error: String,
}

/// Per-process boot bookkeeping: current phase plus the ordered failure
/// sequence.
#[derive(Debug, Default)]
pub struct BootState {
    phase: BootPhase,
    errors: Vec<BootFailure>,
}

impl Default for BootPhase {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl BootState {
    /// Fresh state at `NotStarted`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BootPhase {
        self.phase
    }

    /// Recorded failures, in the order they occurred.
    #[must_use]
    pub fn errors(&self) -> &[BootFailure] {
        &self.errors
    }

    /// Advance to the next phase. Transitions must move strictly forward;
    /// `Failed` is reached through [`BootState::fail`], never `advance`.
    ///
    /// # Errors
    ///
    /// Returns a `Phase` error on a backward, repeated, or post-`Failed`
    /// transition. That error indicates a sequencing bug in the caller.
    pub fn advance(&mut self, next: BootPhase) -> Result<(), BootError> {
        if self.phase == BootPhase::Failed || next == BootPhase::Failed || next <= self.phase {
            return Err(BootError::Phase {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Record a failure and transition to the terminal `Failed` phase.
    /// Valid from any phase; later `advance` calls are rejected.
    pub fn fail(&mut self, name: impl Into<String>, error: &impl fmt::Display) {
        self.errors.push(BootFailure {
            name: name.into(),
            error: error.to_string(),
        });
        self.phase = BootPhase::Failed;
    }
}

/// Fatal boot errors. Any of these terminates the process with a non-zero
/// status; advisory failures never appear here.
#[derive(Debug, Error)]
pub enum BootError {
    /// A fatal-criticality dependency failed to connect.
    #[error("fatal dependency '{name}' failed: {source}")]
    Dependency {
        /// Dependency name.
        name: &'static str,
        /// Underlying connection error.
        #[source]
        source: DependencyError,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The network listener could not bind.
    #[error("failed to bind listener on {addr}: {source}")]
    Listener {
        /// Requested bind address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Collaborator wiring contradicts the configuration (e.g. queued mode
    /// without a queue client). Surfaces at boot, never on first use.
    #[error("boot wiring error: {reason}")]
    Wiring {
        /// Description of the mismatch.
        reason: String,
    },

    /// The boot routine attempted a non-forward phase transition.
    #[error("boot phase may not move from {from:?} to {to:?}")]
    Phase {
        /// Phase the state was in.
        from: BootPhase,
        /// Phase the caller requested.
        to: BootPhase,
    },
}
