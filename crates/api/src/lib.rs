//! Public API layer for keyfold
//!
//! - [`Store`]: Get / Put / Remove / Update / Match over one record type
//! - [`Seq`]: the lazy, cursor-resumable result of a Match
//!
//! ## Quick Start
//!
//! ```ignore
//! use keyfold_api::Store;
//! use keyfold_core::{Config, Context};
//! use keyfold_storage::{MemoryTable, TableStore};
//!
//! let config = Config::new("people");
//! let table = TableStore::new(MemoryTable::new(&config), &config)?;
//! let store: Store<Person, _> = Store::new(table, &config)?;
//!
//! let ctx = Context::background();
//! store.put(&ctx, &person, None)?;
//! let again = store.get(&ctx, &Person::key("dead:beef"))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod seq;
pub mod store;

pub use seq::{Seq, SeqState};
pub use store::Store;
