//! Sorted-table backend
//!
//! - [`TableClient`]: transport boundary; one method per backend call, with
//!   request structs carrying expressions and their placeholder tables
//! - [`TableStore`]: [`Adapter`](keyfold_core::Adapter) that builds those
//!   requests and maps responses into the error taxonomy
//! - [`MemoryTable`]: in-process client that evaluates the expression
//!   grammar, used for tests and local development

pub mod expr;
mod memory;
mod store;

pub use memory::MemoryTable;
pub use store::TableStore;

use keyfold_core::{Item, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// `#alias -> wire name`
pub type NameTable = BTreeMap<String, String>;

/// `:alias -> literal`
pub type ValueTable = BTreeMap<String, Value>;

/// Failure reported by a table client
#[derive(Debug, Error)]
pub enum TableError {
    /// The request's condition expression evaluated to false
    #[error("The conditional request failed")]
    ConditionalCheckFailed,

    /// The table does not exist
    #[error("Requested resource not found: {0}")]
    ResourceNotFound(String),

    /// The request is malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or service failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Point read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetRequest {
    /// Table name
    pub table: String,
    /// Both key attributes
    pub key: Item,
    /// Attributes to return; `None` returns all
    pub projection: Option<String>,
    /// Name placeholders of the projection
    pub names: NameTable,
}

/// Create or replace an item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutRequest {
    /// Table name
    pub table: String,
    /// Complete item including key attributes
    pub item: Item,
    /// Condition on the current item
    pub condition: Option<String>,
    /// Name placeholders
    pub names: NameTable,
    /// Value placeholders
    pub values: ValueTable,
}

/// Delete an item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteRequest {
    /// Table name
    pub table: String,
    /// Both key attributes
    pub key: Item,
    /// Condition on the current item
    pub condition: Option<String>,
    /// Name placeholders
    pub names: NameTable,
    /// Value placeholders
    pub values: ValueTable,
}

/// Modify an item in place, creating it if missing; returns the new item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    /// Table name
    pub table: String,
    /// Both key attributes
    pub key: Item,
    /// `SET`/`REMOVE` actions; `None` only ensures the item exists
    pub update: Option<String>,
    /// Condition on the current item
    pub condition: Option<String>,
    /// Name placeholders
    pub names: NameTable,
    /// Value placeholders
    pub values: ValueTable,
}

/// Range query within one hash key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// Table name
    pub table: String,
    /// Equality on the hash key, optionally with a sort-key condition
    pub key_condition: String,
    /// Condition applied after the page limit
    pub filter: Option<String>,
    /// Name placeholders
    pub names: NameTable,
    /// Value placeholders
    pub values: ValueTable,
    /// Items evaluated per page
    pub limit: Option<usize>,
    /// Ascending sort-key order
    pub forward: bool,
    /// Exclusive start key from a previous page
    pub start_key: Option<Item>,
}

/// One page of a range query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    /// Matching items
    pub items: Vec<Item>,
    /// Key of the last evaluated item when more remain
    pub last_evaluated_key: Option<Item>,
}

/// Transport to a sorted-table backend
pub trait TableClient: Send + Sync {
    /// Point read; `None` if the item does not exist
    fn get_item(&self, request: GetRequest) -> Result<Option<Item>, TableError>;

    /// Conditional create or replace
    fn put_item(&self, request: PutRequest) -> Result<(), TableError>;

    /// Conditional delete; deleting a missing item succeeds
    fn delete_item(&self, request: DeleteRequest) -> Result<(), TableError>;

    /// Conditional update returning the item after the update
    fn update_item(&self, request: UpdateRequest) -> Result<Item, TableError>;

    /// One page of a range query
    fn query(&self, request: QueryRequest) -> Result<QueryResponse, TableError>;
}

impl<C: TableClient + ?Sized> TableClient for std::sync::Arc<C> {
    fn get_item(&self, request: GetRequest) -> Result<Option<Item>, TableError> {
        (**self).get_item(request)
    }

    fn put_item(&self, request: PutRequest) -> Result<(), TableError> {
        (**self).put_item(request)
    }

    fn delete_item(&self, request: DeleteRequest) -> Result<(), TableError> {
        (**self).delete_item(request)
    }

    fn update_item(&self, request: UpdateRequest) -> Result<Item, TableError> {
        (**self).update_item(request)
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, TableError> {
        (**self).query(request)
    }
}
