//! Data model shared by the fetcher, the reconciler and the orchestrator.

pub mod duration;
pub mod membership;
pub mod page;

pub use duration::{decode, encode, DurationError, RetentionDuration, Seconds, NEVER_EXPIRES};
pub use membership::{MembershipSet, Relation, RelationOp};
pub use page::{Collection, ListRequest, Page, ResumableQuery, SortDir};

/// Identity of a resource on the appliance, as learned from a create response
/// or a prior read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RemoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
