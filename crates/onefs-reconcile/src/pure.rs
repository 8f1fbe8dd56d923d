//! Pure membership reconciliation.
//!
//! Computes the add/remove operations that move a current membership set to a
//! desired one. Nothing here performs I/O; the relation executor issues the
//! operations.

use onefs_core::{MembershipSet, Relation, RelationChange, RelationOp};

/// Minimal operations turning `current` into `desired`.
///
/// Removals come first, then additions, each in identity order. Applying the
/// result to `current` yields exactly `desired`, and the operation count equals
/// the size of the symmetric difference.
pub fn reconcile(current: &MembershipSet, desired: &MembershipSet) -> Vec<RelationOp> {
    let removals = current.difference(desired).map(|id| RelationOp::Remove(id.to_string()));
    let additions = desired.difference(current).map(|id| RelationOp::Add(id.to_string()));
    removals.chain(additions).collect()
}

/// Remove every current membership, then add every desired one.
///
/// Used when memberships are keyed by a parent identity that is changing, so
/// an identity present in both sets still has to be re-added under the new key.
pub fn replace_all(current: &MembershipSet, desired: &MembershipSet) -> Vec<RelationOp> {
    let removals = current.iter().map(|id| RelationOp::Remove(id.to_string()));
    let additions = desired.iter().map(|id| RelationOp::Add(id.to_string()));
    removals.chain(additions).collect()
}

/// Operations for one relation of one resource, with the parent identities
/// they are issued against.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationPlan {
    pub relation: Relation,
    pub current_parent: String,
    pub desired_parent: String,
    pub ops: Vec<RelationOp>,
    /// Removals must all run before additions
    pub replace_all: bool,
}

impl RelationPlan {
    /// Plan the operations for a relation change.
    pub fn from_change(change: &RelationChange) -> Self {
        let ops = if change.key_changed {
            replace_all(&change.current, &change.desired)
        } else {
            reconcile(&change.current, &change.desired)
        };
        Self {
            relation: change.relation,
            current_parent: change.current_parent.clone(),
            desired_parent: change.desired_parent.clone(),
            ops,
            replace_all: change.key_changed,
        }
    }

    pub fn removals(&self) -> impl Iterator<Item = &RelationOp> {
        self.ops.iter().filter(|op| !op.is_add())
    }

    pub fn additions(&self) -> impl Iterator<Item = &RelationOp> {
        self.ops.iter().filter(|op| op.is_add())
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Parent identity an operation is issued against
    pub fn parent_for(&self, op: &RelationOp) -> &str {
        if op.is_add() {
            &self.desired_parent
        } else {
            &self.current_parent
        }
    }
}
