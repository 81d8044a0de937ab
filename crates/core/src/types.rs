//! Wire key types
//!
//! This module defines the fixed two-attribute key shape every backend stores:
//! - Key: canonical (hash key, sort key) pair
//! - SORT_KEY_SENTINEL: placeholder written when an identity has no suffix

use crate::error::{Error, Result};
use crate::identity::Iri;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort-key value written for identities with an empty suffix
///
/// Backends with a mandatory two-attribute key cannot store an empty sort
/// key, so the codec substitutes this sentinel and strips it on decode.
pub const SORT_KEY_SENTINEL: &str = "_";

/// Canonical wire key: (hash key, sort key)
///
/// The sort key is never empty; an absent suffix is stored as
/// [`SORT_KEY_SENTINEL`].
///
/// Ordering follows the backend's sort order: hash key first, then sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    hash_key: String,
    sort_key: String,
}

impl Key {
    /// Create a canonical key
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the hash key is empty.
    pub fn new(hash_key: impl Into<String>, sort_key: impl Into<String>) -> Result<Self> {
        let hash_key = hash_key.into();
        if hash_key.is_empty() {
            return Err(Error::invalid_key("hash key cannot be empty"));
        }
        Ok(Self {
            hash_key,
            sort_key: canonical_sort_key(sort_key.into()),
        })
    }

    /// Canonical key of an identity
    pub fn from_iri(id: &Iri) -> Result<Self> {
        Self::new(id.prefix(), id.suffix())
    }

    /// Hash-key value
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Sort-key value (sentinel for root identities)
    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    /// Identity this key encodes; the sentinel maps back to an empty suffix
    pub fn to_iri(&self) -> Iri {
        if self.sort_key == SORT_KEY_SENTINEL {
            Iri::root(self.hash_key.clone())
        } else {
            Iri::join(self.hash_key.clone(), self.sort_key.clone())
        }
    }
}

/// Substitute the sentinel for an empty sort key
pub fn canonical_sort_key(sort_key: String) -> String {
    if sort_key.is_empty() {
        SORT_KEY_SENTINEL.to_string()
    } else {
        sort_key
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_substitutes_sentinel() {
        let key = Key::new("dead:beef", "").unwrap();
        assert_eq!(key.sort_key(), SORT_KEY_SENTINEL);
        assert_eq!(key.to_iri(), Iri::root("dead:beef"));
    }

    #[test]
    fn test_key_keeps_sort_key() {
        let key = Key::from_iri(&Iri::join("a", "b/c")).unwrap();
        assert_eq!(key.hash_key(), "a");
        assert_eq!(key.sort_key(), "b/c");
        assert_eq!(key.to_iri(), Iri::join("a", "b/c"));
    }

    #[test]
    fn test_key_rejects_empty_hash() {
        let err = Key::new("", "x").unwrap_err();
        assert!(err.is_invalid_key());
    }

    #[test]
    fn test_key_ordering_hash_then_sort() {
        let a1 = Key::new("a", "1").unwrap();
        let a2 = Key::new("a", "2").unwrap();
        let b0 = Key::new("b", "0").unwrap();
        assert!(a1 < a2);
        assert!(a2 < b0);
    }

    #[test]
    fn test_key_display_is_iri_text() {
        let key = Key::new("dead:beef", "").unwrap();
        assert_eq!(key.to_string(), "dead:beef:");
    }
}
