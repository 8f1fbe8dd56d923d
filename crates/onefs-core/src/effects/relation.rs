//! Membership mutation effects

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::Relation;

/// Adds and removes members of a parent resource's relation.
#[async_trait]
pub trait RelationEffects: Send + Sync {
    async fn add_relation(&self, relation: Relation, parent: &str, child: &str) -> Result<()>;

    async fn remove_relation(&self, relation: Relation, parent: &str, child: &str) -> Result<()>;
}
