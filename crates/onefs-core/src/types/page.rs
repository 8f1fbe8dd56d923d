//! Pages, list requests, and drained collections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One batch of a resume-token list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` or empty means this page is the last.
    pub resume: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, resume: Option<String>) -> Self {
        Self { items, resume }
    }

    /// A terminal page
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            resume: None,
        }
    }

    /// The resume token, treating an empty string as absent.
    pub fn resume_token(&self) -> Option<&str> {
        self.resume.as_deref().filter(|token| !token.is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.resume_token().is_none()
    }
}

/// Every item of one logical list query, in retrieval order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection<T> {
    items: Vec<T>,
    pages: usize,
}

impl<T> Collection<T> {
    pub fn new(items: Vec<T>, pages: usize) -> Self {
        Self { items, pages }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Number of pages fetched to build this collection
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A list request that can be continued with a resume token.
pub trait ResumableQuery: Clone + Send + Sync {
    /// The request to issue for the page after `token`.
    fn with_resume(&self, token: &str) -> Self;

    /// Whether the caller bounded the query with an explicit limit.
    fn is_bounded(&self) -> bool;
}

/// Sort direction accepted by list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDir {
    Asc,
    Desc,
}

/// Parameters of a collection list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub sort: Option<String>,
    pub dir: Option<SortDir>,
    /// Explicit page size; when set, pagination is not followed.
    pub limit: Option<u32>,
    /// Endpoint specific filters such as `zone` or `provider`
    pub query: BTreeMap<String, String>,
    pub resume: Option<String>,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self
    }

    pub fn dir(mut self, dir: SortDir) -> Self {
        self.dir = Some(dir);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

impl ResumableQuery for ListRequest {
    fn with_resume(&self, token: &str) -> Self {
        Self {
            resume: Some(token.to_string()),
            ..self.clone()
        }
    }

    fn is_bounded(&self) -> bool {
        self.limit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_terminal() {
        let page: Page<u8> = Page::new(vec![1], Some(String::new()));
        assert!(page.is_terminal());
        assert_eq!(page.resume_token(), None);

        let page: Page<u8> = Page::new(vec![1], Some("t1".into()));
        assert_eq!(page.resume_token(), Some("t1"));
    }

    #[test]
    fn with_resume_keeps_parameters() {
        let request = ListRequest::new()
            .sort("name")
            .dir(SortDir::Desc)
            .filter("zone", "System");
        let next = request.with_resume("abc");
        assert_eq!(next.resume.as_deref(), Some("abc"));
        assert_eq!(next.sort.as_deref(), Some("name"));
        assert_eq!(next.query.get("zone").map(String::as_str), Some("System"));
        assert!(request.resume.is_none());
    }

    #[test]
    fn limit_bounds_the_query() {
        assert!(!ListRequest::new().is_bounded());
        assert!(ListRequest::new().limit(10).is_bounded());
    }
}
