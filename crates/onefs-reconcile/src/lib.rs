#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(missing_docs)]
//! # OneFS Reconcile - Retrieval, Reconciliation and Convergence
//!
//! Engine that drives declared storage-appliance resources to their desired
//! state:
//! - **Pagination**: drains resume-token list endpoints into one collection,
//!   keeping partial results when a later page fails
//! - **Reconciliation**: pure add/remove planning between membership sets and
//!   best-effort execution that aggregates per-identity failures
//! - **Convergence**: create, verify and compensate with an explicit phase
//!   machine; updates guarded by immutable-field checks
//! - **Resources**: snapshot schedules, user groups, file pool policies and
//!   SyncIQ performance rules
//!
//! ## Design Principles
//!
//! - **Pure planning**: set differences and deltas never touch the network
//! - **Injected effects**: every remote call goes through a collaborator trait
//! - **No orphans**: a created resource that fails verification is deleted
//! - **Cancellable**: each remote call races the run's cancellation token

pub mod config;
pub mod convergence;
pub mod pagination;
pub mod prelude;
pub mod pure;
pub mod relations;
pub mod resources;

pub use config::{ReconcileConfig, RelationOrder};
pub use convergence::{Convergence, ConvergencePhase, ConvergenceReport, ConvergenceResult, UpdateOutcome};
pub use pagination::{fetch_all, CollectionFetcher, FetchFailure};
pub use pure::{reconcile, replace_all, RelationPlan};
pub use relations::{RelationExecutor, RelationReport};
