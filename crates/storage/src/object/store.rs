//! Object adapter
//!
//! Wire layout: object key `<hash><separator><sort>` (default separator
//! `/_/`), body a JSON document of every non-key attribute. Key attributes
//! are restored from the object key on read. A hash key containing the
//! separator would make object keys ambiguous and is rejected as
//! `InvalidKey`.
//!
//! The object store has no conditional writes: guards are evaluated against
//! a fresh read, and [`Adapter::update_item`] is a read-merge-write. Neither
//! is atomic. Concurrent writers to the same key can interleave between the
//! read and the write and lose updates.

use super::{ObjectClient, ObjectError};
use keyfold_core::{
    guard_failure, Adapter, Config, Context, Cursor, Error, Item, Key, KeyCodec, Page, Predicate,
    Projection, Query, Result, Value, WriteOp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// [`Adapter`] over a prefix-listable object store
#[derive(Debug)]
pub struct ObjectStore<C> {
    client: C,
    config: Config,
    keys: KeyCodec,
    warned_update: AtomicBool,
}

impl<C: ObjectClient> ObjectStore<C> {
    /// Adapter over `client` for the configured bucket
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the configuration is invalid.
    pub fn new(client: C, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config: config.clone(),
            keys: KeyCodec::new(config),
            warned_update: AtomicBool::new(false),
        })
    }

    /// Underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    fn bucket(&self) -> &str {
        &self.config.collection
    }

    /// Object key of a record key
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the hash key contains the object separator.
    pub fn object_key(&self, key: &Key) -> Result<String> {
        let base = self.partition(key.hash_key())?;
        Ok(format!("{}{}", base, key.sort_key()))
    }

    /// Listing prefix shared by every object under `hash_key`
    fn partition(&self, hash_key: &str) -> Result<String> {
        let separator = &self.config.object_separator;
        if hash_key.contains(separator.as_str()) {
            return Err(Error::invalid_key(format!(
                "hash key '{}' contains the object separator '{}'",
                hash_key, separator
            )));
        }
        Ok(format!("{}{}", hash_key, separator))
    }

    fn transport(&self, op: &str, e: ObjectError) -> Error {
        Error::service_io_with(format!("{} on bucket '{}'", op, self.bucket()), e)
    }

    fn read(&self, ctx: &Context, key: &Key) -> Result<Option<Item>> {
        let object_key = self.object_key(key)?;
        let body = self
            .client
            .get_object(self.bucket(), &object_key)
            .map_err(|e| self.transport("get", e))?;
        ctx.check()?;

        let Some(body) = body else {
            return Ok(None);
        };
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&body)
            .map_err(|e| Error::service_io_with(format!("corrupt object '{}'", object_key), e))?;
        let mut item: Item = document
            .into_iter()
            .map(|(attr, value)| (attr, Value::from(value)))
            .collect();
        item.extend(self.keys.encode(key));
        Ok(Some(item))
    }

    fn write(&self, key: &Key, item: &Item) -> Result<()> {
        let document: serde_json::Map<String, serde_json::Value> = item
            .iter()
            .filter(|(attr, _)| !self.keys.is_key_attr(attr))
            .map(|(attr, value)| (attr.clone(), serde_json::Value::from(value.clone())))
            .collect();
        let body = serde_json::to_vec(&document)
            .map_err(|e| Error::invalid_entity("object body", e.to_string()))?;

        self.client
            .put_object(self.bucket(), &self.object_key(key)?, body)
            .map_err(|e| self.transport("put", e))
    }

    fn check_guard(
        &self,
        ctx: &Context,
        op: WriteOp,
        key: &Key,
        guard: Option<&Predicate>,
    ) -> Result<Option<Item>> {
        let current = self.read(ctx, key)?;
        if let Some(guard) = guard {
            if !guard.matches(current.as_ref()) {
                warn!(
                    target: "keyfold::object",
                    op = op.name(),
                    key = %key,
                    guard = %guard,
                    "Write guard rejected"
                );
                return Err(guard_failure(op, key, Some(guard)));
            }
        }
        Ok(current)
    }
}

impl<C: ObjectClient> Adapter for ObjectStore<C> {
    fn fetch_page(&self, ctx: &Context, query: &Query, cursor: Option<&Cursor>) -> Result<Page> {
        ctx.check()?;
        if query.reverse {
            return Err(Error::invalid_operation(
                "object store listings are ascending only",
            ));
        }

        let base = self.partition(&query.hash_key)?;
        let prefix = format!("{}{}", base, query.sort_prefix.as_deref().unwrap_or(""));
        let max_keys = match query.limit {
            Some(requested) => self.config.page_limit(requested)?,
            None => self.config.page_size.unwrap_or(self.config.max_page_size),
        };
        let start_after = match cursor {
            Some(cursor) if !cursor.is_zero() => Some(self.object_key(&cursor.key()?)?),
            _ => None,
        };

        debug!(
            target: "keyfold::object",
            prefix = %prefix,
            max_keys,
            resume = start_after.is_some(),
            "ListObjects"
        );
        let listing = self
            .client
            .list_objects(self.bucket(), &prefix, start_after.as_deref(), max_keys)
            .map_err(|e| self.transport("list", e))?;
        ctx.check()?;

        let mut items = Vec::with_capacity(listing.keys.len());
        let mut last = None;
        for object_key in &listing.keys {
            let Some(sort) = object_key.strip_prefix(&base) else {
                continue;
            };
            let key = Key::new(query.hash_key.as_str(), sort)?;
            // deleted between listing and read
            if let Some(item) = self.read(ctx, &key)? {
                if query.filter.as_ref().map_or(true, |f| f.matches(Some(&item))) {
                    items.push(item);
                }
            }
            last = Some(key);
        }

        let next = if listing.truncated {
            last.map(|key| Cursor::at(&key))
        } else {
            None
        };
        trace!(
            target: "keyfold::object",
            items = items.len(),
            more = next.is_some(),
            "Listing page"
        );
        Ok(Page { items, next })
    }

    fn get_item(&self, ctx: &Context, key: &Key, projection: Option<&Projection>) -> Result<Item> {
        ctx.check()?;
        debug!(target: "keyfold::object", key = %key, "GetObject");
        let mut item = self
            .read(ctx, key)?
            .ok_or_else(|| Error::not_found(key.to_string()))?;
        if let Some(projection) = projection {
            item.retain(|attr, _| projection.attributes().any(|p| p == attr.as_str()));
        }
        Ok(item)
    }

    fn put_item(&self, ctx: &Context, item: Item, guard: Option<&Predicate>) -> Result<()> {
        ctx.check()?;
        let key = self.keys.decode("item", &item)?;
        debug!(target: "keyfold::object", key = %key, guarded = guard.is_some(), "PutObject");
        if guard.is_some() {
            self.check_guard(ctx, WriteOp::Put, &key, guard)?;
        }
        self.write(&key, &item)
    }

    fn delete_item(&self, ctx: &Context, key: &Key, guard: Option<&Predicate>) -> Result<()> {
        ctx.check()?;
        debug!(target: "keyfold::object", key = %key, guarded = guard.is_some(), "DeleteObject");
        if guard.is_some() {
            self.check_guard(ctx, WriteOp::Remove, key, guard)?;
        }
        self.client
            .delete_object(self.bucket(), &self.object_key(key)?)
            .map_err(|e| self.transport("delete", e))
    }

    fn update_item(
        &self,
        ctx: &Context,
        key: &Key,
        delta: Item,
        guard: Option<&Predicate>,
    ) -> Result<Item> {
        ctx.check()?;
        if !self.warned_update.swap(true, Ordering::Relaxed) {
            warn!(
                target: "keyfold::object",
                bucket = self.bucket(),
                "Object store updates are read-merge-write and not atomic under concurrent writers"
            );
        }
        debug!(target: "keyfold::object", key = %key, attributes = delta.len(), "UpdateObject");

        let mut item = self
            .check_guard(ctx, WriteOp::Update, key, guard)?
            .unwrap_or_else(|| self.keys.encode(key));
        item.extend(
            delta
                .into_iter()
                .filter(|(attr, _)| !self.keys.is_key_attr(attr)),
        );
        self.write(key, &item)?;
        Ok(item)
    }
}
