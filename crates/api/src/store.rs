//! Record store facade
//!
//! [`Store`] binds one record type to one adapter. Every operation encodes
//! through the record's codec, issues one adapter call (Match: one per
//! page) and annotates failures with the operation name and key.
//!
//! ## Desugaring
//!
//! | Facade | Adapter |
//! |--------|---------|
//! | `get(key)` | `get_item(key, projection of keys and schema attributes)` |
//! | `put(record, guard)` | `put_item(encode(record), guard)` |
//! | `remove(key, guard)` | `delete_item(key, guard)` |
//! | `update(record, guard)` | `update_item(key, non-null attributes, guard)` |
//! | `matching(key)` | `fetch_page(hash = prefix, begins_with suffix)` per page |
//!
//! Types with custom-coded fields are fetched without a projection.
//!
//! Writes take a single optional guard. Combining several guards on one
//! write is not supported.

use crate::seq::Seq;
use keyfold_core::{
    Adapter, Attribute, Codec, Config, Context, Error, Key, Predicate, Projection, Query, Result,
    Thing,
};
use tracing::debug;

/// Typed access to records of type `T` through adapter `A`
#[derive(Debug)]
pub struct Store<T, A> {
    adapter: A,
    codec: Codec<T>,
    config: Config,
    projection: Option<Projection>,
}

impl<T: Thing, A: Adapter> Store<T, A> {
    /// Store over `adapter` for the configured collection
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an invalid configuration and
    /// `Error::Schema` if `T`'s descriptor is inconsistent.
    pub fn new(adapter: A, config: &Config) -> Result<Self> {
        config.validate()?;
        let codec = Codec::new(config)?;
        // custom codecs may write nested attributes a projection cannot name
        let projection = codec
            .schema()
            .custom_entries()
            .next()
            .is_none()
            .then(|| Projection::of(codec.schema(), config.key_attributes()));
        Ok(Self {
            adapter,
            codec,
            config: config.clone(),
            projection,
        })
    }

    /// Underlying adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Record codec
    pub fn codec(&self) -> &Codec<T> {
        &self.codec
    }

    /// Attribute handle of a logical field of `T`
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the field is unknown or has no wire name.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        Attribute::from_schema(self.codec.schema(), name)
    }

    /// Handle on the hash-key attribute
    pub fn hash_key(&self) -> Attribute {
        Attribute::key(self.config.hash_key.clone())
    }

    /// Handle on the sort-key attribute
    pub fn sort_key(&self) -> Attribute {
        Attribute::key(self.config.sort_key.clone())
    }

    fn key_of(&self, op: &'static str, record: &T) -> Result<Key> {
        self.codec
            .key_of(record)
            .map_err(|e| e.with_context(op, record.identity().to_string()))
    }

    /// Fetch the record under the identity of the key-shaped `key`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such record.
    pub fn get(&self, ctx: &Context, key: &T) -> Result<T> {
        let key = self.key_of("get", key)?;
        self.adapter
            .get_item(ctx, &key, self.projection.as_ref())
            .and_then(|item| self.codec.decode(&item))
            .map_err(|e| e.with_context("get", key.to_string()))
    }

    /// Create or overwrite a record
    ///
    /// # Errors
    ///
    /// Returns `PreConditionFailed` if `guard` is not satisfied.
    pub fn put(&self, ctx: &Context, record: &T, guard: Option<&Predicate>) -> Result<()> {
        let key = self.key_of("put", record)?;
        self.codec
            .encode(record)
            .and_then(|item| self.adapter.put_item(ctx, item, guard))
            .map_err(|e| e.with_context("put", key.to_string()))
    }

    /// Delete the record under the identity of the key-shaped `key`
    ///
    /// # Errors
    ///
    /// Returns `PreConditionFailed` if `guard` is not satisfied.
    pub fn remove(&self, ctx: &Context, key: &T, guard: Option<&Predicate>) -> Result<()> {
        let key = self.key_of("remove", key)?;
        self.adapter
            .delete_item(ctx, &key, guard)
            .map_err(|e| e.with_context("remove", key.to_string()))
    }

    /// Set every non-null attribute of `record` and return the complete
    /// record after the update
    ///
    /// A missing record is created unless `guard` requires it to exist.
    ///
    /// # Errors
    ///
    /// Returns `PreConditionFailed` if `guard` is not satisfied.
    pub fn update(&self, ctx: &Context, record: &T, guard: Option<&Predicate>) -> Result<T> {
        let key = self.key_of("update", record)?;
        self.codec
            .delta(record)
            .and_then(|delta| self.adapter.update_item(ctx, &key, delta, guard))
            .and_then(|item| self.codec.decode(&item))
            .map_err(|e| e.with_context("update", key.to_string()))
    }

    /// Every record under the prefix of `key`, restricted to sort keys
    /// beginning with its suffix when the suffix is not empty
    pub fn matching(&self, ctx: &Context, key: &T) -> Seq<'_, T, A> {
        self.matching_with(ctx, key, None)
    }

    /// [`Store::matching`] with a filter predicate
    pub fn matching_with(
        &self,
        ctx: &Context,
        key: &T,
        filter: Option<Predicate>,
    ) -> Seq<'_, T, A> {
        let id = key.identity();
        let mut query = Query::new(id.prefix());
        if !id.suffix().is_empty() {
            query.sort_prefix = Some(id.suffix().to_string());
        }
        query.filter = filter;
        query.limit = self.config.page_size;

        if id.prefix().is_empty() {
            let err = Error::invalid_key("match requires a hash key");
            return Seq::failed(&self.adapter, self.codec.clone(), ctx.clone(), query, err);
        }
        debug!(
            target: "keyfold::store",
            hash_key = id.prefix(),
            sort_prefix = ?query.sort_prefix,
            filtered = query.filter.is_some(),
            "Match"
        );
        Seq::new(&self.adapter, self.codec.clone(), ctx.clone(), query)
    }
}
