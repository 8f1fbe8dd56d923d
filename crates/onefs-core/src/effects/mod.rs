//! Collaborator capabilities consumed by the engine.
//!
//! This module defines **what** remote operations the engine needs; the
//! surrounding system (HTTP client, session handling) defines **how**. The
//! engine receives implementations by explicit injection and never reaches for
//! process-wide state, so tests substitute in-memory handlers freely.
//!
//! - [`PageSource`]: one page of a resume-token list endpoint
//! - [`ResourceEffects`]: create/read/update/delete for one resource kind
//! - [`RelationEffects`]: membership add/remove

pub mod listing;
pub mod relation;
pub mod resource;

pub use listing::PageSource;
pub use relation::RelationEffects;
pub use resource::{Created, ResourceEffects};
