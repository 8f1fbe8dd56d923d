//! List endpoint effects

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{Page, ResumableQuery};

/// Fetches one page of a list endpoint.
///
/// Implementations must return the resume token alongside the items.
#[async_trait]
pub trait PageSource<Q, T>: Send + Sync
where
    Q: ResumableQuery,
    T: Send,
{
    async fn fetch(&self, request: &Q) -> Result<Page<T>>;
}
