//! Record codec
//!
//! Records travel as [`Item`]s. Encoding is two-phase:
//!
//! 1. **Generic pass**: the record is serialized with serde; every field the
//!    serde derive writes becomes an attribute.
//! 2. **Overlay pass**: fields declared [`FieldKind::Custom`] are written by
//!    their own [`FieldCodec`] into sub-maps at their wire names, then the
//!    identity is written into the two key attributes.
//!
//! Decoding mirrors it: key attributes and custom sub-maps are split off, the
//! remaining attributes go through serde, then the identity is restored and
//! each custom hook receives its isolated sub-map.
//!
//! Canonicalization: an identity without a suffix is stored with the
//! sort-key sentinel, so the backend's two-attribute key is always present.
//!
//! ## Record contract
//!
//! - serde field names equal the wire names declared in [`Thing::fields`]
//! - the identity field and custom fields are `#[serde(skip)]`
//!
//! [`FieldKind::Custom`]: crate::schema::FieldKind::Custom

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::Iri;
use crate::schema::{owns_attribute, schema_of, FieldDescriptor, FieldKind, Schema};
use crate::types::Key;
use crate::value::{Item, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// Application record with a composite identity
pub trait Thing: Serialize + DeserializeOwned + 'static {
    /// Ordered type descriptor the schema is built from
    fn fields() -> &'static [FieldDescriptor];

    /// Identity: prefix is the hash key, suffix the sort key
    fn identity(&self) -> Iri;

    /// Restore the identity after decoding
    fn set_identity(&mut self, id: Iri);

    /// Write custom-coded fields
    fn encode_custom(&self, fields: &mut FieldWriter<'_>) -> Result<()> {
        let _ = fields;
        Ok(())
    }

    /// Read custom-coded fields
    fn decode_custom(&mut self, fields: &FieldReader<'_>) -> Result<()> {
        let _ = fields;
        Ok(())
    }
}

/// Per-field codec for value objects the generic pass cannot express
pub trait FieldCodec: Sized {
    /// Encode into a sub-map
    ///
    /// Every attribute must be `wire` itself or nested as `wire.<name>`.
    fn marshal_field(&self, wire: &str) -> Result<Item>;

    /// Decode from the isolated sub-map of `wire`
    fn unmarshal_field(wire: &str, sub: &Item) -> Result<Self>;
}

/// Collects custom sub-maps during encode
#[derive(Debug)]
pub struct FieldWriter<'a> {
    schema: &'a Schema,
    overlay: Item,
}

impl<'a> FieldWriter<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            overlay: Item::new(),
        }
    }

    /// Encode the custom field `name` with its codec
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if `name` is not a custom field and
    /// `InvalidEntity` if the codec writes outside its sub-map.
    pub fn put<V: FieldCodec>(&mut self, name: &str, value: &V) -> Result<()> {
        let wire = custom_wire(self.schema, name)?;
        let sub = value.marshal_field(wire)?;
        if let Some(stray) = sub.keys().find(|attr| !owns_attribute(wire, attr)) {
            return Err(Error::invalid_entity(
                self.schema.type_name(),
                format!("codec of '{}' wrote foreign attribute '{}'", name, stray),
            ));
        }
        self.overlay.extend(sub);
        Ok(())
    }

    fn into_item(self) -> Item {
        self.overlay
    }
}

/// Hands isolated sub-maps to custom hooks during decode
#[derive(Debug)]
pub struct FieldReader<'a> {
    schema: &'a Schema,
    item: &'a Item,
}

impl<'a> FieldReader<'a> {
    /// Decode the custom field `name` from its sub-map
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if `name` is not a custom field, or whatever
    /// the codec returns.
    pub fn get<V: FieldCodec>(&self, name: &str) -> Result<V> {
        let wire = custom_wire(self.schema, name)?;
        let sub: Item = self
            .item
            .iter()
            .filter(|(attr, _)| owns_attribute(wire, attr))
            .map(|(attr, value)| (attr.clone(), value.clone()))
            .collect();
        V::unmarshal_field(wire, &sub)
    }
}

fn custom_wire(schema: &Schema, name: &str) -> Result<&'static str> {
    match schema.lookup(name) {
        Some(entry) if entry.kind == FieldKind::Custom => Ok(entry.wire),
        Some(_) => Err(Error::schema(
            schema.type_name(),
            format!("field '{}' is not declared custom", name),
        )),
        None => schema.wire_name(name),
    }
}

/// Key attribute names and the key encoding shared by codecs and adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    hash_key: String,
    sort_key: String,
}

impl KeyCodec {
    /// Key codec for the configured attribute names
    pub fn new(config: &Config) -> Self {
        Self {
            hash_key: config.hash_key.clone(),
            sort_key: config.sort_key.clone(),
        }
    }

    /// Hash-key attribute name
    pub fn hash_attr(&self) -> &str {
        &self.hash_key
    }

    /// Sort-key attribute name
    pub fn sort_attr(&self) -> &str {
        &self.sort_key
    }

    /// Whether an attribute is one of the two key attributes
    pub fn is_key_attr(&self, attr: &str) -> bool {
        attr == self.hash_key || attr == self.sort_key
    }

    /// Two-attribute wire form of a key
    pub fn encode(&self, key: &Key) -> Item {
        let mut item = Item::new();
        item.insert(self.hash_key.clone(), Value::from(key.hash_key()));
        item.insert(self.sort_key.clone(), Value::from(key.sort_key()));
        item
    }

    /// Key of a wire item
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` unless both key attributes are present strings.
    pub fn decode(&self, type_name: &str, item: &Item) -> Result<Key> {
        let hash = self.string_attr(type_name, item, &self.hash_key)?;
        let sort = self.string_attr(type_name, item, &self.sort_key)?;
        Key::new(hash, sort)
    }

    fn string_attr<'i>(&self, type_name: &str, item: &'i Item, attr: &str) -> Result<&'i str> {
        match item.get(attr) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(Error::schema(
                type_name,
                format!("key attribute '{}' holds {}", attr, other.type_name()),
            )),
            None => Err(Error::schema(
                type_name,
                format!("key attribute '{}' is missing", attr),
            )),
        }
    }
}

/// Encoder and decoder of one record type
#[derive(Debug)]
pub struct Codec<T> {
    schema: Arc<Schema>,
    keys: KeyCodec,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            keys: self.keys.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Thing> Codec<T> {
    /// Codec for `T` under the configured key attributes
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the type descriptor is inconsistent or a
    /// field's wire name collides with a key attribute.
    pub fn new(config: &Config) -> Result<Self> {
        let schema = schema_of::<T>()?;
        let keys = KeyCodec::new(config);
        if let Some(wire) = schema.wire_names().find(|w| keys.is_key_attr(w)) {
            return Err(Error::schema(
                schema.type_name(),
                format!("wire name '{}' collides with a key attribute", wire),
            ));
        }
        Ok(Self {
            schema,
            keys,
            _record: PhantomData,
        })
    }

    /// Schema of `T`
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Key attribute codec
    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    /// Canonical key of a record
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the identity has no prefix.
    pub fn key_of(&self, record: &T) -> Result<Key> {
        Key::from_iri(&record.identity())
    }

    /// Encode a record into a wire item
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for a record without hash key and
    /// `InvalidEntity` if marshalling fails.
    pub fn encode(&self, record: &T) -> Result<Item> {
        let key = self.key_of(record)?;
        let type_name = self.schema.type_name();

        let json = serde_json::to_value(record)
            .map_err(|e| Error::invalid_entity(type_name, e.to_string()))?;
        let serde_json::Value::Object(fields) = json else {
            return Err(Error::invalid_entity(
                type_name,
                "record must serialize to a map",
            ));
        };
        let mut item: Item = fields
            .into_iter()
            .map(|(attr, value)| (attr, Value::from(value)))
            .collect();

        let mut writer = FieldWriter::new(&self.schema);
        record.encode_custom(&mut writer)?;
        item.extend(writer.into_item());
        item.extend(self.keys.encode(&key));

        trace!(target: "keyfold::codec", type_name, key = %key, attributes = item.len(), "Encoded record");
        Ok(item)
    }

    /// Decode a wire item into a record
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if a key attribute is missing and
    /// `InvalidEntity` if unmarshalling fails.
    pub fn decode(&self, item: &Item) -> Result<T> {
        let type_name = self.schema.type_name();
        let key = self.keys.decode(type_name, item)?;

        let generic: serde_json::Map<String, serde_json::Value> = item
            .iter()
            .filter(|(attr, _)| !self.keys.is_key_attr(attr) && !self.schema.is_custom_wire(attr))
            .map(|(attr, value)| (attr.clone(), serde_json::Value::from(value.clone())))
            .collect();
        let mut record: T = serde_json::from_value(serde_json::Value::Object(generic))
            .map_err(|e| Error::invalid_entity(type_name, e.to_string()))?;

        record.set_identity(key.to_iri());
        record.decode_custom(&FieldReader {
            schema: &self.schema,
            item,
        })?;
        Ok(record)
    }

    /// Attributes an update writes: the encoded record without key
    /// attributes and without null values
    ///
    /// # Errors
    ///
    /// Same as [`Codec::encode`].
    pub fn delta(&self, record: &T) -> Result<Item> {
        let mut item = self.encode(record)?;
        item.retain(|attr, value| !self.keys.is_key_attr(attr) && !value.is_null());
        Ok(item)
    }
}
