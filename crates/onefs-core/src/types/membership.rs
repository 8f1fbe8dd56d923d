//! Membership sets and the operations that move one toward another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Relation between a parent resource and a set of child identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Users that belong to a group
    GroupMembers,
    /// Roles a group is assigned to
    RoleAssignments,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::GroupMembers => f.write_str("group_members"),
            Relation::RoleAssignments => f.write_str("role_assignments"),
        }
    }
}

/// Unordered set of opaque identities. Comparison is exact: no case folding
/// or normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipSet(BTreeSet<String>);

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Identities in `self` but not in `other`
    pub fn difference<'a>(&'a self, other: &'a MembershipSet) -> impl Iterator<Item = &'a str> {
        self.0.difference(&other.0).map(String::as_str)
    }

    /// Apply operations to a copy of this set.
    pub fn apply(&self, ops: &[RelationOp]) -> MembershipSet {
        let mut next = self.0.clone();
        for op in ops {
            match op {
                RelationOp::Add(identity) => {
                    next.insert(identity.clone());
                }
                RelationOp::Remove(identity) => {
                    next.remove(identity);
                }
            }
        }
        MembershipSet(next)
    }
}

impl<S: Into<String>> FromIterator<S> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        MembershipSet(iter.into_iter().map(Into::into).collect())
    }
}

/// One membership mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationOp {
    Add(String),
    Remove(String),
}

impl RelationOp {
    pub fn identity(&self) -> &str {
        match self {
            RelationOp::Add(identity) | RelationOp::Remove(identity) => identity,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, RelationOp::Add(_))
    }
}

impl fmt::Display for RelationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationOp::Add(identity) => write!(f, "add {identity}"),
            RelationOp::Remove(identity) => write!(f, "remove {identity}"),
        }
    }
}
