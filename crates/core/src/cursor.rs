//! Pagination cursor
//!
//! A [`Cursor`] is the resume position of a paginated query: the key of the
//! last item the backend evaluated. It is only meaningful for queries over
//! the same hash key. Callers obtain cursors from a sequence and hand them
//! back unchanged; [`Cursor::to_token`] gives a transportable string form.

use crate::error::{Error, Result};
use crate::identity::Iri;
use crate::types::{canonical_sort_key, Key};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque (hash key, sort key) resume position
///
/// The default value is the zero cursor: no position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    hash_key: String,
    sort_key: String,
}

impl Cursor {
    /// Cursor positioned at a key
    pub fn at(key: &Key) -> Self {
        Self {
            hash_key: key.hash_key().to_string(),
            sort_key: key.sort_key().to_string(),
        }
    }

    /// Cursor positioned after an identity
    ///
    /// An identity without a suffix is positioned at the sort-key sentinel,
    /// matching the canonical wire form.
    pub fn after(id: &Iri) -> Self {
        Self {
            hash_key: id.prefix().to_string(),
            sort_key: canonical_sort_key(id.suffix().to_string()),
        }
    }

    /// The zero cursor carries no position
    pub fn is_zero(&self) -> bool {
        self.hash_key.is_empty() && self.sort_key.is_empty()
    }

    /// Key of the position
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for the zero cursor.
    pub fn key(&self) -> Result<Key> {
        Key::new(self.hash_key.clone(), self.sort_key.clone())
    }

    /// Hash-key component
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Sort-key component
    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    /// Opaque continuation token for transport across process boundaries
    pub fn to_token(&self) -> String {
        let pair = (&self.hash_key, &self.sort_key);
        // serializing a pair of strings cannot fail
        let json = serde_json::to_vec(&pair).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token produced by [`Cursor::to_token`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the token is not a valid cursor.
    pub fn from_token(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::invalid_key(format!("malformed cursor token: {}", e)))?;
        let (hash_key, sort_key): (String, String) = serde_json::from_slice(&bytes)
            .map_err(|e| Error::invalid_key(format!("malformed cursor token: {}", e)))?;
        Ok(Self { hash_key, sort_key })
    }
}

impl From<Key> for Cursor {
    fn from(key: Key) -> Self {
        Cursor::at(&key)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}
