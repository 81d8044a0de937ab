//! Storage adapters for keyfold
//!
//! This crate implements the two backend shapes behind
//! [`keyfold_core::Adapter`]:
//! - TableStore: sorted table with range queries, `begins_with` and atomic
//!   conditional writes, over a [`TableClient`]
//! - ObjectStore: path-addressed objects listed by prefix, over an
//!   [`ObjectClient`]; guards and updates are client-side and not atomic
//! - MemoryTable, MemoryBucket, FsBucket: clients that need no network

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod object;
pub mod table;

pub use object::{FsBucket, Listing, MemoryBucket, ObjectClient, ObjectError, ObjectStore};
pub use table::{
    DeleteRequest, GetRequest, MemoryTable, PutRequest, QueryRequest, QueryResponse, TableClient,
    TableError, TableStore, UpdateRequest,
};
