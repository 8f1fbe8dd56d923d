//! Per-kind CRUD effects

use async_trait::async_trait;

use crate::errors::Result;
use crate::resource::ResourceSpec;
use crate::types::RemoteId;

/// Outcome of a create call.
#[derive(Debug, Clone, PartialEq)]
pub struct Created<R> {
    /// Identity assigned by the appliance
    pub id: RemoteId,
    /// Echo of the created record, when the endpoint returns one. Not trusted
    /// as the converged state.
    pub response: Option<R>,
}

/// Remote create/read/update/delete for resources of kind `S`.
#[async_trait]
pub trait ResourceEffects<S: ResourceSpec>: Send + Sync {
    async fn create(&self, desired: &S::Desired) -> Result<Created<S::Remote>>;

    async fn read(&self, id: &RemoteId) -> Result<S::Remote>;

    /// Apply `delta`; returns the updated record when the endpoint echoes one.
    async fn update(&self, id: &RemoteId, delta: &S::Delta) -> Result<Option<S::Remote>>;

    async fn delete(&self, id: &RemoteId) -> Result<()>;
}
