//! Convergence orchestration.
//!
//! A run validates the declaration, creates the resource (or adopts an
//! existing singleton), re-reads it, and maps the read into the local model.
//! A failed verification of a freshly created resource triggers a
//! compensating delete so that no orphan is left behind.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Convergence, ConvergenceReport, ConvergenceResult, UpdateOutcome};
pub use state::{ConvergencePhase, PhaseTracker};
