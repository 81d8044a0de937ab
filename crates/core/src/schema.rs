//! Schema reflector
//!
//! A record type describes its fields once through [`Thing::fields`]: an
//! ordered list of logical field names, each with an optional wire attribute
//! name. [`schema_of`] turns that descriptor into an immutable [`Schema`] the
//! first time a type is used and caches it for the life of the process.
//!
//! ## Contract
//!
//! - A field without a wire name yields no schema entry. Looking it up fails
//!   with `Error::Schema`, it never degrades into an inert predicate.
//! - Wire names are unique within a type.
//! - After registration the schema is read-only; lookups from any thread are
//!   a map access, never a re-walk of the descriptor.

use crate::codec::Thing;
use crate::error::{Error, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// How the codec treats a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Marshalled by the generic serde pass
    Generic,
    /// Marshalled by the record's own field codec and overlaid on the item
    Custom,
}

/// One field of a record type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Logical (Rust) field name
    pub name: &'static str,
    /// Wire attribute name, `None` for fields that are not stored
    pub wire: Option<&'static str>,
    /// Codec treatment
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Field stored by the generic marshaller under `wire`
    ///
    /// `wire` must match the field's serde name.
    pub const fn wire(name: &'static str, wire: &'static str) -> Self {
        Self {
            name,
            wire: Some(wire),
            kind: FieldKind::Generic,
        }
    }

    /// Field stored by a custom field codec under `wire`
    pub const fn custom(name: &'static str, wire: &'static str) -> Self {
        Self {
            name,
            wire: Some(wire),
            kind: FieldKind::Custom,
        }
    }

    /// Field without a wire name
    pub const fn unmapped(name: &'static str) -> Self {
        Self {
            name,
            wire: None,
            kind: FieldKind::Generic,
        }
    }
}

/// Mapped field of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    /// Logical field name
    pub name: &'static str,
    /// Wire attribute name
    pub wire: &'static str,
    /// Codec treatment
    pub kind: FieldKind,
}

/// Immutable logical-name to wire-name table of one record type
#[derive(Debug)]
pub struct Schema {
    type_name: &'static str,
    entries: Vec<SchemaEntry>,
    by_name: HashMap<&'static str, usize>,
    unmapped: Vec<&'static str>,
}

impl Schema {
    /// Build a schema from a type descriptor
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` for duplicate field names, duplicate wire
    /// names or empty wire names.
    pub fn build(type_name: &'static str, fields: &[FieldDescriptor]) -> Result<Self> {
        let mut entries = Vec::with_capacity(fields.len());
        let mut by_name = HashMap::with_capacity(fields.len());
        let mut unmapped = Vec::new();
        let mut seen_names = std::collections::HashSet::new();

        for field in fields {
            if !seen_names.insert(field.name) {
                return Err(Error::schema(
                    type_name,
                    format!("field '{}' declared twice", field.name),
                ));
            }

            let Some(wire) = field.wire else {
                unmapped.push(field.name);
                continue;
            };

            if wire.is_empty() {
                return Err(Error::schema(
                    type_name,
                    format!("field '{}' has an empty wire name", field.name),
                ));
            }
            if entries.iter().any(|e: &SchemaEntry| e.wire == wire) {
                return Err(Error::schema(
                    type_name,
                    format!("wire name '{}' used by more than one field", wire),
                ));
            }

            by_name.insert(field.name, entries.len());
            entries.push(SchemaEntry {
                name: field.name,
                wire,
                kind: field.kind,
            });
        }

        Ok(Self {
            type_name,
            entries,
            by_name,
            unmapped,
        })
    }

    /// Rust type the schema describes
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Mapped fields in declaration order
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Entry of a logical field, if it is mapped
    pub fn lookup(&self, name: &str) -> Option<&SchemaEntry> {
        self.by_name.get(name).map(|&at| &self.entries[at])
    }

    /// Wire name of a logical field
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the field is unknown or has no wire name.
    pub fn wire_name(&self, name: &str) -> Result<&'static str> {
        if let Some(entry) = self.lookup(name) {
            return Ok(entry.wire);
        }
        let reason = if self.unmapped.contains(&name) {
            format!("field '{}' has no wire name", name)
        } else {
            format!("unknown field '{}'", name)
        };
        Err(Error::schema(self.type_name, reason))
    }

    /// Wire names of every mapped field
    pub fn wire_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.wire)
    }

    /// Entries written by custom field codecs
    pub fn custom_entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.iter().filter(|e| e.kind == FieldKind::Custom)
    }

    /// Whether a wire attribute belongs to a custom field
    pub fn is_custom_wire(&self, wire: &str) -> bool {
        self.custom_entries().any(|e| owns_attribute(e.wire, wire))
    }
}

/// Whether `attribute` belongs to the sub-map of custom field `wire`
///
/// A custom field owns its wire attribute and every attribute nested under it
/// with a `.` separator.
pub fn owns_attribute(wire: &str, attribute: &str) -> bool {
    attribute == wire
        || (attribute.len() > wire.len()
            && attribute.starts_with(wire)
            && attribute.as_bytes()[wire.len()] == b'.')
}

/// Global schema registry
///
/// Built once per record type; entries are never replaced.
static REGISTRY: Lazy<DashMap<TypeId, Arc<Schema>>> = Lazy::new(DashMap::new);

/// Schema of a record type, built on first use
///
/// # Errors
///
/// Returns `Error::Schema` if the type descriptor is inconsistent.
pub fn schema_of<T: Thing>() -> Result<Arc<Schema>> {
    let id = TypeId::of::<T>();
    if let Some(schema) = REGISTRY.get(&id) {
        return Ok(Arc::clone(schema.value()));
    }

    let schema = Arc::new(Schema::build(std::any::type_name::<T>(), T::fields())?);
    let entry = REGISTRY.entry(id).or_insert_with(|| {
        info!(
            target: "keyfold::schema",
            type_name = schema.type_name(),
            fields = schema.entries().len(),
            "Registered record schema"
        );
        Arc::clone(&schema)
    });
    Ok(Arc::clone(entry.value()))
}
