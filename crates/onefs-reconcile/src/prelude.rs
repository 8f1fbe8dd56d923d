//! OneFS reconcile prelude.
//!
//! Curated re-exports for driving resources.

pub use crate::resources::{
    FilePoolPolicy, FilePoolPolicyDesired, SnapshotSchedule, SnapshotScheduleDesired, SyncIqRule,
    SyncIqRuleDesired, UserGroup, UserGroupDesired,
};
pub use crate::{
    CollectionFetcher, Convergence, ConvergenceResult, FetchFailure, ReconcileConfig, RelationOrder,
    UpdateOutcome,
};
pub use onefs_core::{
    CancelSignal, CancellationToken, ErrorKind, OnefsError, PageSource, RelationEffects, RemoteId,
    ResourceEffects, ResourceSpec,
};
