//! keyfold - typed record mapping onto sorted key-value stores
//!
//! A record is a serde type with an [`Iri`] identity. Its prefix becomes the
//! hash key and its suffix the sort key, so every record under one prefix
//! lives in one partition and can be listed in sort-key order.
//!
//! # Quick Start
//!
//! ```ignore
//! use keyfold::{Config, Context, Iri, MemoryTable, Store, TableStore};
//!
//! let config = Config::new("people");
//! let table = TableStore::new(MemoryTable::new(&config), &config)?;
//! let store: Store<Person, _> = Store::new(table, &config)?;
//!
//! let ctx = Context::background();
//! store.put(&ctx, &person, None)?;
//!
//! let mut seq = store.matching(&ctx, &Person::key(Iri::join("dead:beef", "")));
//! while seq.advance() {
//!     println!("{:?}", seq.value()?);
//! }
//! ```
//!
//! # Architecture
//!
//! - `keyfold-core`: identities, keys, values, the record codec, predicates
//!   and the [`Adapter`] contract
//! - `keyfold-storage`: the table and object-store adapters with in-memory
//!   and filesystem clients
//! - `keyfold-api`: the typed [`Store`] facade and the paginated [`Seq`]

pub use keyfold_api::*;
pub use keyfold_core::*;
pub use keyfold_storage::*;
