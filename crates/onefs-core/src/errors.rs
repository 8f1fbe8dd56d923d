//! Unified error system for the reconciliation engine
//!
//! One enum carries every failure kind the engine can surface. Each variant
//! keeps the structured cause; string rendering is left to `Display` and to
//! whatever presents the error to a user.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ValidationError;
use crate::types::{DurationError, Relation, RelationOp};

/// Coarse classification of an [`OnefsError`], used by caller-level retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Pre-flight structural check failed; nothing was sent to the appliance.
    Validation,
    /// A remote call failed.
    Transport,
    /// A remote response could not be translated to the local representation.
    Mapping,
    /// A duration exceeded the representable seconds range.
    Overflow,
    /// A duration string could not be parsed.
    Format,
    /// A mutation of an immutable field was rejected locally.
    ImmutableField,
    /// One or more relation operations failed.
    PartialOperation,
    /// A rollback failed after an earlier failure.
    Compensation,
    /// The cancellation signal fired.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Mapping => "mapping",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Format => "format",
            ErrorKind::ImmutableField => "immutable_field",
            ErrorKind::PartialOperation => "partial_operation",
            ErrorKind::Compensation => "compensation",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Unified error type for all engine operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OnefsError {
    /// Desired state failed pre-validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Remote call failed
    #[error("Transport error during {operation}: {message}")]
    Transport {
        /// Remote operation that failed, e.g. `create snapshot_schedule`
        operation: String,
        /// Message reported by the collaborator
        message: String,
    },

    /// Remote response could not be mapped
    #[error("Mapping error for {resource}: {message}")]
    Mapping {
        /// Resource kind being mapped
        resource: String,
        /// What was missing or malformed
        message: String,
    },

    /// Duration codec failure
    #[error(transparent)]
    Duration(#[from] DurationError),

    /// Immutable field change rejected before any remote call
    #[error("May not change {field} of {resource}")]
    ImmutableField {
        /// Resource kind
        resource: String,
        /// Guarded field
        field: String,
    },

    /// Aggregate of relation operation failures
    #[error(transparent)]
    PartialOperation(#[from] PartialOperationError),

    /// Rollback failed after an earlier failure; the original is preserved
    #[error("{original} (compensating delete of {remote_id} also failed: {rollback})")]
    Compensation {
        /// Identity the rollback targeted
        remote_id: String,
        /// The failure that triggered compensation
        original: Box<OnefsError>,
        /// The failure of the rollback itself
        rollback: Box<OnefsError>,
    },

    /// Cancellation fired before the operation completed
    #[error("Cancelled during {operation}")]
    Cancelled {
        /// Operation in flight or about to start
        operation: String,
    },
}

impl OnefsError {
    /// Create a transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create an immutable field error
    pub fn immutable_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ImmutableField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Wrap an original failure together with the failure of its rollback
    pub fn compensation(remote_id: impl Into<String>, original: OnefsError, rollback: OnefsError) -> Self {
        Self::Compensation {
            remote_id: remote_id.into(),
            original: Box::new(original),
            rollback: Box::new(rollback),
        }
    }

    /// Classification tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            OnefsError::Validation(_) => ErrorKind::Validation,
            OnefsError::Transport { .. } => ErrorKind::Transport,
            OnefsError::Mapping { .. } => ErrorKind::Mapping,
            OnefsError::Duration(err) => err.kind(),
            OnefsError::ImmutableField { .. } => ErrorKind::ImmutableField,
            OnefsError::PartialOperation(_) => ErrorKind::PartialOperation,
            OnefsError::Compensation { .. } => ErrorKind::Compensation,
            OnefsError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether a caller-level retry loop may reasonably try again.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Whether the error was raised locally before any remote side effect.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::ImmutableField | ErrorKind::Format | ErrorKind::Overflow
        )
    }
}

/// Standard Result type for engine operations
pub type Result<T> = std::result::Result<T, OnefsError>;

/// A relation operation that failed, tagged with the offending identity.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationFailure {
    pub relation: Relation,
    pub operation: RelationOp,
    pub cause: Box<OnefsError>,
}

impl OperationFailure {
    pub fn new(relation: Relation, operation: RelationOp, cause: OnefsError) -> Self {
        Self {
            relation,
            operation,
            cause: Box::new(cause),
        }
    }

    /// Identity the failed operation targeted
    pub fn identity(&self) -> &str {
        self.operation.identity()
    }
}

/// Aggregate of one or more relation-operation failures.
///
/// Carries the operations that did succeed so the caller can decide on
/// partial-apply semantics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialOperationError {
    pub succeeded: Vec<(Relation, RelationOp)>,
    pub failures: Vec<OperationFailure>,
}

impl PartialOperationError {
    /// Identities of every failed operation, in execution order
    pub fn failed_identities(&self) -> Vec<&str> {
        self.failures.iter().map(OperationFailure::identity).collect()
    }
}

impl fmt::Display for PartialOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} relation operations failed",
            self.failures.len(),
            self.failures.len() + self.succeeded.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "; {} {}: {}",
                failure.relation, failure.operation, failure.cause
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialOperationError {}
