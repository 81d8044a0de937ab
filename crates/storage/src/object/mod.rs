//! Object-store backend
//!
//! Objects are addressed by path-like keys and listed by prefix; the store
//! offers no predicates and no conditional writes.
//!
//! - [`ObjectClient`]: transport boundary (get, put, delete, list)
//! - [`ObjectStore`]: [`Adapter`](keyfold_core::Adapter) with client-side
//!   guards and a read-merge-write update
//! - [`MemoryBucket`], [`FsBucket`]: in-process and directory-backed clients

mod fs;
mod memory;
mod store;

pub use fs::FsBucket;
pub use memory::MemoryBucket;
pub use store::ObjectStore;

use std::io;
use thiserror::Error;

/// Failure reported by an object client
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The bucket does not exist
    #[error("No such bucket: {0}")]
    NoSuchBucket(String),

    /// The object key cannot be stored by this client
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Network or service failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Object keys in ascending order
    pub keys: Vec<String>,
    /// More keys follow the last one
    pub truncated: bool,
}

/// Transport to an object store
pub trait ObjectClient: Send + Sync {
    /// Object body; `None` if the object does not exist
    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, ObjectError>;

    /// Create or replace an object
    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), ObjectError>;

    /// Delete an object; deleting a missing object succeeds
    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectError>;

    /// Keys beginning with `prefix`, strictly after `start_after`, at most
    /// `max_keys` of them
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<Listing, ObjectError>;
}

impl<C: ObjectClient + ?Sized> ObjectClient for std::sync::Arc<C> {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, ObjectError> {
        (**self).get_object(bucket, key)
    }

    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), ObjectError> {
        (**self).put_object(bucket, key, body)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectError> {
        (**self).delete_object(bucket, key)
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<Listing, ObjectError> {
        (**self).list_objects(bucket, prefix, start_after, max_keys)
    }
}
