//! Sopen server: boot sequencer, HTTP surface, and collaborator wiring.
//!
//! The binary in `main.rs` parses arguments, initializes logging, wires the
//! concrete collaborators, and hands everything to [`boot::prepare`]. The
//! split into a library crate exists so integration tests can drive the full
//! boot sequence with stub collaborators and a real listener.

pub mod boot;
pub mod collaborators;
pub mod context;
pub mod fs_safe;
pub mod metrics;
pub mod routes;
