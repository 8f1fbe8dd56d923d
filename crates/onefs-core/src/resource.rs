//! Per-kind resource declarations.
//!
//! A [`ResourceSpec`] ties together the declared (desired) shape of a resource
//! kind, the record the appliance returns for it, and the local model the
//! engine reports. Mapping between them is explicit and statically typed: one
//! `map` function per kind, testable without any remote collaborator.

use std::fmt::Debug;

use crate::config::ValidationResult;
use crate::errors::Result;
use crate::types::{MembershipSet, Relation, RemoteId};

/// Declaration of one resource kind.
pub trait ResourceSpec: Send + Sync + 'static {
    /// Kind name used in logs and errors, e.g. `snapshot_schedule`
    const KIND: &'static str;

    /// Locally declared desired state
    type Desired: Clone + Debug + Send + Sync;
    /// Record returned by the appliance
    type Remote: Clone + Debug + Send + Sync;
    /// Local representation reported after convergence
    type Model: Clone + Debug + PartialEq + Send + Sync;
    /// Body of an update call
    type Delta: Clone + Debug + Send + Sync;

    /// Structural checks that need no remote call.
    fn validate(desired: &Self::Desired) -> ValidationResult;

    /// Translate an appliance record into the local model.
    ///
    /// `hint` is the declaration the record was produced for, when one exists;
    /// mapping may prefer declared spellings over re-rendered remote values.
    fn map(remote: &Self::Remote, hint: Option<&Self::Desired>) -> Result<Self::Model>;

    /// Identity of a mapped model on the appliance
    fn remote_id(model: &Self::Model) -> RemoteId;

    /// Identity of the resource once `desired` has been applied to `current`,
    /// for kinds keyed by a mutable field.
    fn remote_id_after(current: &Self::Model, _desired: &Self::Desired) -> RemoteId {
        Self::remote_id(current)
    }

    /// Changes from `current` to `desired`, or `None` when nothing but
    /// relations differ.
    fn delta(current: &Self::Model, desired: &Self::Desired) -> Result<Option<Self::Delta>>;

    /// Name of an immutable field that `desired` would change.
    fn immutable_violation(_current: &Self::Model, _desired: &Self::Desired) -> Option<&'static str> {
        None
    }

    /// Checks on a transition that depend on the current state, such as a
    /// key change that requires an explicit force flag.
    fn validate_change(_current: &Self::Model, _desired: &Self::Desired) -> ValidationResult {
        Ok(())
    }

    /// Relation-valued attributes to reconcile after the scalar update.
    fn relations(_current: &Self::Model, _desired: &Self::Desired) -> Vec<RelationChange> {
        Vec::new()
    }

    /// Relations assigned right after create, for memberships the create
    /// body cannot carry.
    fn initial_relations(_desired: &Self::Desired) -> Vec<RelationChange> {
        Vec::new()
    }

    /// Singleton resources that always exist on the appliance are adopted
    /// instead of created; this returns the identity to adopt.
    fn adopt_target(_desired: &Self::Desired) -> Option<RemoteId> {
        None
    }

    /// Whether destroying `model` only forgets it locally. Adopted singletons
    /// cannot be deleted from the appliance.
    fn retained_on_destroy(_model: &Self::Model) -> bool {
        false
    }

    /// Update body that brings an adopted singleton to `desired`.
    fn adopt_delta(_desired: &Self::Desired) -> Result<Self::Delta> {
        Err(crate::errors::OnefsError::mapping(
            Self::KIND,
            "resource kind cannot be adopted",
        ))
    }
}

/// Current and desired members of one relation of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationChange {
    pub relation: Relation,
    /// Parent identity that removals are issued against
    pub current_parent: String,
    /// Parent identity that additions are issued against
    pub desired_parent: String,
    pub current: MembershipSet,
    pub desired: MembershipSet,
    /// The parent's key identity changed, so memberships keyed to the old
    /// identity must all be replaced
    pub key_changed: bool,
}

impl RelationChange {
    /// A relation whose parent identity is stable
    pub fn stable(relation: Relation, parent: impl Into<String>, current: MembershipSet, desired: MembershipSet) -> Self {
        let parent = parent.into();
        Self {
            relation,
            current_parent: parent.clone(),
            desired_parent: parent,
            current,
            desired,
            key_changed: false,
        }
    }
}
