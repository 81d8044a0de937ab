//! Core types and traits for keyfold
//!
//! This crate defines the record-level data-access core:
//! - Iri: composite (prefix, suffix) identity with hierarchy operations
//! - Key / Cursor: fixed two-attribute wire key and resume position
//! - Value / Item: wire attribute values and attribute maps
//! - Schema: per-type logical-name to wire-name table, built once
//! - Codec: two-phase record encoding with custom field codecs
//! - Constraint: typed predicates, compiled expressions and projections
//! - Adapter: the backend boundary consumed by the facade
//! - Error: error taxonomy with capability predicates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod constraint;
pub mod context;
pub mod cursor;
pub mod error;
pub mod identity;
pub mod schema;
pub mod traits;
pub mod types;
pub mod value;

pub use codec::{Codec, FieldCodec, FieldReader, FieldWriter, KeyCodec, Thing};
pub use config::Config;
pub use constraint::{
    attribute, guard_failure, Attribute, DyadicOp, Expression, Predicate, Projection, UnaryOp,
    WriteOp, UNSET,
};
pub use context::{CancelToken, Context};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use identity::Iri;
pub use schema::{schema_of, FieldDescriptor, FieldKind, Schema};
pub use traits::{Adapter, Page, Query};
pub use types::{Key, SORT_KEY_SENTINEL};
pub use value::{Item, Value};
