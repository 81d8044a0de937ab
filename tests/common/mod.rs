//! Shared fixtures for the integration suites.
//!
//! Import via `mod common;` from a test's main.rs.

#![allow(dead_code)]

use keyfold::{
    Adapter, Config, FieldDescriptor, FsBucket, Iri, MemoryBucket, MemoryTable, ObjectStore,
    Store, TableStore, Thing,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness, once per binary
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Record type
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(skip)]
    pub id: Iri,
    #[serde(rename = "someName")]
    pub name: String,
    pub age: i64,
    #[serde(skip)]
    pub scratch: String,
}

impl Person {
    pub fn new(id: Iri, name: &str, age: i64) -> Self {
        Person {
            id,
            name: name.to_string(),
            age,
            scratch: String::new(),
        }
    }

    /// Key-shaped record: only the identity is set
    pub fn key(id: Iri) -> Self {
        Person {
            id,
            ..Person::default()
        }
    }
}

impl Thing for Person {
    fn fields() -> &'static [FieldDescriptor] {
        const FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor::wire("name", "someName"),
            FieldDescriptor::wire("age", "age"),
            FieldDescriptor::unmapped("scratch"),
        ];
        FIELDS
    }

    fn identity(&self) -> Iri {
        self.id.clone()
    }

    fn set_identity(&mut self, id: Iri) {
        self.id = id;
    }
}

// ============================================================================
// Backends
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Table,
    ObjectMemory,
    ObjectFs,
}

pub const ALL_BACKENDS: [Backend; 3] = [Backend::Table, Backend::ObjectMemory, Backend::ObjectFs];

/// A store over one backend, plus whatever must outlive it
pub struct Fixture {
    pub backend: Backend,
    pub store: Store<Person, Arc<dyn Adapter>>,
    _dir: Option<TempDir>,
}

impl Fixture {
    pub fn new(backend: Backend) -> Self {
        Self::with_config(backend, Config::new("people"))
    }

    pub fn with_config(backend: Backend, config: Config) -> Self {
        init_tracing();
        let mut dir = None;
        let adapter: Arc<dyn Adapter> = match backend {
            Backend::Table => {
                Arc::new(TableStore::new(MemoryTable::new(&config), &config).unwrap())
            }
            Backend::ObjectMemory => {
                Arc::new(ObjectStore::new(MemoryBucket::new(), &config).unwrap())
            }
            Backend::ObjectFs => {
                let tmp = TempDir::new().unwrap();
                let bucket = FsBucket::open(tmp.path()).unwrap();
                dir = Some(tmp);
                Arc::new(ObjectStore::new(bucket, &config).unwrap())
            }
        };
        Fixture {
            backend,
            store: Store::new(adapter, &config).unwrap(),
            _dir: dir,
        }
    }
}
