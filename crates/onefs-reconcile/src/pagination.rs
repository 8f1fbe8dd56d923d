//! Draining resume-token list endpoints.
//!
//! A list endpoint returns one page and, when more data exists, a resume
//! token. [`CollectionFetcher`] follows tokens until the appliance stops
//! returning one, except when the caller bounded the query with an explicit
//! limit: a limit is taken as "just this page".
//!
//! A failure on any page after the first does not discard the pages already
//! fetched: [`FetchFailure::partial`] carries them alongside the error so a
//! caller can decide whether a prefix is usable.

use std::fmt;

use onefs_core::{guarded, Collection, CancellationToken, NeverCancel, OnefsError, PageSource, ResumableQuery};
use tracing::{debug, warn};

use crate::config::ReconcileConfig;

/// A drain that stopped on an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure<T> {
    /// Items accumulated before the failing page; `None` when the first
    /// page failed
    pub partial: Option<Collection<T>>,
    pub error: OnefsError,
}

impl<T> FetchFailure<T> {
    /// Items retrieved before the failure, possibly none
    pub fn items(&self) -> &[T] {
        match &self.partial {
            Some(partial) => partial.items(),
            None => &[],
        }
    }

    pub fn into_parts(self) -> (Vec<T>, OnefsError) {
        let items = self.partial.map(Collection::into_items).unwrap_or_default();
        (items, self.error)
    }
}

impl<T> From<FetchFailure<T>> for OnefsError {
    fn from(failure: FetchFailure<T>) -> Self {
        failure.error
    }
}

impl<T> fmt::Display for FetchFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.partial {
            Some(partial) => write!(
                f,
                "{} (after {} items from {} pages)",
                self.error,
                partial.len(),
                partial.pages()
            ),
            None => write!(f, "{}", self.error),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for FetchFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Follows resume tokens until a list endpoint is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionFetcher {
    max_pages: Option<u32>,
}

impl CollectionFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            max_pages: config.max_pages,
        }
    }

    /// Fail a drain that would follow more than `max_pages` pages
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Retrieve every item matching `request`, in page order.
    pub async fn fetch_all<Q, T, S>(
        &self,
        source: &S,
        request: &Q,
        cancel: &dyn CancellationToken,
    ) -> Result<Collection<T>, FetchFailure<T>>
    where
        Q: ResumableQuery,
        T: Send,
        S: PageSource<Q, T> + ?Sized,
    {
        let first = guarded(cancel, "fetch first page", source.fetch(request))
            .await
            .map_err(|error| {
                warn!(error = %error, "first page fetch failed");
                FetchFailure { partial: None, error }
            })?;

        let mut token = first.resume_token().map(str::to_owned);
        let mut items = first.items;
        let mut pages = 1usize;

        if request.is_bounded() {
            if token.is_some() {
                debug!(items = items.len(), "bounded query, resume token not followed");
            }
            return Ok(Collection::new(items, pages));
        }

        while let Some(resume) = token.take() {
            if let Some(max_pages) = self.max_pages {
                if pages >= max_pages as usize {
                    let error = OnefsError::transport(
                        "fetch page",
                        format!("resume token still present after {pages} pages"),
                    );
                    warn!(pages, max_pages, "page cap reached");
                    return Err(FetchFailure {
                        partial: Some(Collection::new(items, pages)),
                        error,
                    });
                }
            }

            let next = request.with_resume(&resume);
            match guarded(cancel, "fetch next page", source.fetch(&next)).await {
                Ok(page) => {
                    pages += 1;
                    token = page.resume_token().map(str::to_owned);
                    debug!(page = pages, items = page.items.len(), more = token.is_some(), "fetched page");
                    items.extend(page.items);
                }
                Err(error) => {
                    warn!(page = pages + 1, accumulated = items.len(), error = %error, "page fetch failed");
                    return Err(FetchFailure {
                        partial: Some(Collection::new(items, pages)),
                        error,
                    });
                }
            }
        }

        Ok(Collection::new(items, pages))
    }
}

/// Drain `request` with no page cap and no cancellation.
pub async fn fetch_all<Q, T, S>(source: &S, request: &Q) -> Result<Collection<T>, FetchFailure<T>>
where
    Q: ResumableQuery,
    T: Send,
    S: PageSource<Q, T> + ?Sized,
{
    CollectionFetcher::new().fetch_all(source, request, &NeverCancel).await
}
