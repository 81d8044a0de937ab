//! Storage adapter abstraction
//!
//! [`Adapter`] is the boundary between the record-level core and a concrete
//! backend. The core hands it wire items and compiled predicates; the
//! adapter performs exactly one backend call per method and interprets the
//! response into the error taxonomy.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync).

use crate::constraint::{Predicate, Projection};
use crate::context::Context;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::types::Key;
use crate::value::Item;
use std::sync::Arc;

/// Shape of a Match request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Hash key every returned item shares
    pub hash_key: String,
    /// Restrict sort keys to those beginning with this prefix
    pub sort_prefix: Option<String>,
    /// Predicate applied to every candidate item
    pub filter: Option<Predicate>,
    /// Page size; `None` lets the backend decide
    pub limit: Option<usize>,
    /// Scan in descending sort-key order
    pub reverse: bool,
}

impl Query {
    /// Query over every item under a hash key
    pub fn new(hash_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            ..Self::default()
        }
    }

    /// Restrict to sort keys beginning with `prefix`
    pub fn with_sort_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sort_prefix = Some(prefix.into());
        self
    }

    /// Apply a filter predicate
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Request pages of at most `limit` items
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of raw query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Wire items in scan order
    pub items: Vec<Item>,
    /// Continuation: key of the last evaluated item, `None` when the scan
    /// is complete
    pub next: Option<Cursor>,
}

impl Page {
    /// Final page holding `items`
    pub fn last(items: Vec<Item>) -> Self {
        Self { items, next: None }
    }

    /// Whether the backend reported more data
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Backend operations the core consumes
pub trait Adapter: Send + Sync {
    /// Fetch one page of `query`, starting after `cursor`
    ///
    /// # Errors
    ///
    /// Returns `ServiceIo` on transport failure and `Canceled` if the
    /// context is done.
    fn fetch_page(&self, ctx: &Context, query: &Query, cursor: Option<&Cursor>) -> Result<Page>;

    /// Fetch the item stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such item.
    fn get_item(&self, ctx: &Context, key: &Key, projection: Option<&Projection>) -> Result<Item>;

    /// Create or overwrite the item; its key is read from the key attributes
    ///
    /// # Errors
    ///
    /// Returns `PreConditionFailed` if `guard` is not satisfied.
    fn put_item(&self, ctx: &Context, item: Item, guard: Option<&Predicate>) -> Result<()>;

    /// Delete the item stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `PreConditionFailed` if `guard` is not satisfied.
    fn delete_item(&self, ctx: &Context, key: &Key, guard: Option<&Predicate>) -> Result<()>;

    /// Set the attributes of `delta` on the item under `key` and return the
    /// complete item after the update
    ///
    /// # Errors
    ///
    /// Returns `PreConditionFailed` if `guard` is not satisfied.
    fn update_item(
        &self,
        ctx: &Context,
        key: &Key,
        delta: Item,
        guard: Option<&Predicate>,
    ) -> Result<Item>;
}

impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn fetch_page(&self, ctx: &Context, query: &Query, cursor: Option<&Cursor>) -> Result<Page> {
        (**self).fetch_page(ctx, query, cursor)
    }

    fn get_item(&self, ctx: &Context, key: &Key, projection: Option<&Projection>) -> Result<Item> {
        (**self).get_item(ctx, key, projection)
    }

    fn put_item(&self, ctx: &Context, item: Item, guard: Option<&Predicate>) -> Result<()> {
        (**self).put_item(ctx, item, guard)
    }

    fn delete_item(&self, ctx: &Context, key: &Key, guard: Option<&Predicate>) -> Result<()> {
        (**self).delete_item(ctx, key, guard)
    }

    fn update_item(
        &self,
        ctx: &Context,
        key: &Key,
        delta: Item,
        guard: Option<&Predicate>,
    ) -> Result<Item> {
        (**self).update_item(ctx, key, delta, guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = Query::new("dead:beef").with_sort_prefix("a/").with_limit(2);
        assert_eq!(query.hash_key, "dead:beef");
        assert_eq!(query.sort_prefix.as_deref(), Some("a/"));
        assert_eq!(query.limit, Some(2));
        assert!(!query.reverse);
        assert!(query.filter.is_none());
    }

    #[test]
    fn test_page_continuation() {
        assert!(!Page::last(Vec::new()).has_more());
        let page = Page {
            items: Vec::new(),
            next: Some(Cursor::default()),
        };
        assert!(page.has_more());
    }
}
