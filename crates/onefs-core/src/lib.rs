#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(missing_docs)]
//! # OneFS Core - Data Model, Errors, and Collaborator Effects
//!
//! Foundation for reconciling declared storage-appliance resources against a
//! collection-oriented REST API:
//! - **Types**: pages and resume tokens, drained collections, membership sets,
//!   relation operations, retention durations and their string codec
//! - **Errors**: one structured taxonomy with a `kind()` tag per failure
//! - **Effects**: the remote capabilities the engine consumes (list page,
//!   CRUD, relation add/remove), injected explicitly
//! - **Cancellation**: cooperative tokens and [`cancel::guarded`] for racing
//!   remote calls
//! - **Config**: TOML/env loading contract and the validation accumulator
//!
//! ## Design Principles
//!
//! - **Pure where possible**: the codec and the data model never perform I/O
//! - **Explicit injection**: no process-wide mocking hooks or globals
//! - **Structured failures**: errors keep their cause; rendering is a
//!   presentation concern

pub mod cancel;
pub mod config;
pub mod effects;
pub mod errors;
pub mod resource;
pub mod types;

pub use cancel::{guarded, CancelSignal, CancellationToken, NeverCancel};
pub use config::{ConfigError, ConfigValidator, EngineConfig, ValidationError, ValidationResult};
pub use effects::{Created, PageSource, RelationEffects, ResourceEffects};
pub use errors::{ErrorKind, OnefsError, OperationFailure, PartialOperationError, Result};
pub use resource::{RelationChange, ResourceSpec};
pub use types::{
    Collection, DurationError, ListRequest, MembershipSet, Page, Relation, RelationOp, RemoteId,
    ResumableQuery, RetentionDuration, Seconds, SortDir, NEVER_EXPIRES,
};
