//! Convergence phases.
//!
//! ```text
//! Planned → Creating → Verifying → Converged
//!    ↓         ↓  ↘        ↓   ↘
//!  Failed    Failed  ↘ Compensating → Failed
//! ```
//!
//! Phases only move forward. `Converged` and `Failed` are terminal.
//! `Compensating` is entered only when a rollback delete is issued.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

/// Where one convergence run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePhase {
    Planned,
    /// Create call (or adopt update) in flight
    Creating,
    /// Read-back of the created identity in flight
    Verifying,
    /// Rolling back a created resource that failed verification
    Compensating,
    Converged,
    Failed,
}

impl ConvergencePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::Failed)
    }

    /// Allowed transitions:
    /// - Planned → Creating, Failed
    /// - Creating → Verifying, Failed, Compensating (post-create relation
    ///   assignment failed)
    /// - Verifying → Converged, Compensating, Failed (nothing to roll back)
    /// - Compensating → Failed
    pub fn can_transition_to(&self, next: ConvergencePhase) -> bool {
        use ConvergencePhase::*;

        matches!(
            (self, next),
            (Planned, Creating)
                | (Planned, Failed)
                | (Creating, Verifying)
                | (Creating, Failed)
                | (Creating, Compensating)
                | (Verifying, Converged)
                | (Verifying, Compensating)
                | (Verifying, Failed)
                | (Compensating, Failed)
        )
    }
}

impl fmt::Display for ConvergencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planned => "planned",
            Self::Creating => "creating",
            Self::Verifying => "verifying",
            Self::Compensating => "compensating",
            Self::Converged => "converged",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Records the phases one run passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    history: Vec<ConvergencePhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            history: vec![ConvergencePhase::Planned],
        }
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ConvergencePhase {
        self.history
            .last()
            .copied()
            .unwrap_or(ConvergencePhase::Planned)
    }

    /// Move to `next`. An illegal transition is logged and ignored.
    pub fn advance(&mut self, next: ConvergencePhase) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            error!(from = %current, to = %next, "illegal convergence transition");
            return false;
        }
        debug!(from = %current, to = %next, "convergence transition");
        self.history.push(next);
        true
    }

    pub fn history(&self) -> &[ConvergencePhase] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ConvergencePhase> {
        self.history
    }
}
