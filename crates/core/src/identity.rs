//! Composite hierarchical identity
//!
//! An [`Iri`] is a `(prefix, suffix)` pair of path-like strings. The prefix
//! lands in the hash-key attribute, the suffix in the sort-key attribute.
//! Ancestry is encoded as `/`-separated segments so one-to-many relations can
//! be matched with a sort-key prefix.
//!
//! ## Laws
//!
//! - `Iri::parse(&id.format()) == Ok(id)` for every identity
//! - `id.heir(x)?.parent() == id` for every proper segment `x`
//! - `Iri::default().heir(x)? == Iri::join(x, "")`
//!
//! ## Text form
//!
//! `prefix:suffix`, with `%` and `:` percent-escaped inside the suffix so the
//! last `:` is always the delimiter. A string without `:` parses as a root
//! identity with an empty suffix.

use crate::error::{Error, Result};
use crate::value::{Item, Value};
use crate::codec::FieldCodec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between hierarchy segments
pub const SEGMENT_SEPARATOR: char = '/';

/// Delimiter between prefix and suffix in the text form
pub const DELIMITER: char = ':';

/// Composite identity of a stored record
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri {
    prefix: String,
    suffix: String,
}

impl Iri {
    /// Join a prefix and a suffix into an identity
    pub fn join(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Root-level identity with an empty suffix
    pub fn root(prefix: impl Into<String>) -> Self {
        Self::join(prefix, "")
    }

    /// Hash-key part
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sort-key part, possibly empty
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Both parts are empty
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.suffix.is_empty()
    }

    /// Hierarchy segments of the suffix
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.suffix
            .split(SEGMENT_SEPARATOR)
            .filter(|segment| !segment.is_empty())
    }

    /// Drop the last path segment
    ///
    /// Segments are taken from the suffix first; an identity with an empty
    /// suffix loses the last segment of its prefix. The parent of the empty
    /// identity is the empty identity.
    pub fn parent(&self) -> Self {
        if !self.suffix.is_empty() {
            return Self::join(self.prefix.clone(), drop_last_segment(&self.suffix));
        }
        Self::join(drop_last_segment(&self.prefix), "")
    }

    /// Append a segment
    ///
    /// Applied to the empty identity it yields `Iri::join(segment, "")`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the segment is empty or contains `/`.
    pub fn heir(&self, segment: &str) -> Result<Self> {
        validate_segment(segment)?;

        if self.is_empty() {
            return Ok(Self::root(segment));
        }
        if self.suffix.is_empty() {
            return Ok(Self::join(self.prefix.clone(), segment));
        }
        Ok(Self::join(
            self.prefix.clone(),
            format!("{}{}{}", self.suffix, SEGMENT_SEPARATOR, segment),
        ))
    }

    /// Single-string text form
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(self.prefix.len() + self.suffix.len() + 1);
        out.push_str(&self.prefix);
        out.push(DELIMITER);
        for c in self.suffix.chars() {
            match c {
                '%' => out.push_str("%25"),
                ':' => out.push_str("%3A"),
                c => out.push(c),
            }
        }
        out
    }

    /// Parse the text form produced by [`Iri::format`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for a malformed escape sequence in the suffix.
    pub fn parse(s: &str) -> Result<Self> {
        match s.rsplit_once(DELIMITER) {
            None => Ok(Self::root(s)),
            Some((prefix, suffix)) => Ok(Self::join(prefix, unescape(suffix)?)),
        }
    }
}

fn drop_last_segment(path: &str) -> String {
    match path.rfind(SEGMENT_SEPARATOR) {
        Some(at) => path[..at].to_string(),
        None => String::new(),
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::invalid_key("identity segment cannot be empty"));
    }
    if segment.contains(SEGMENT_SEPARATOR) {
        return Err(Error::invalid_key(format!(
            "identity segment '{}' cannot contain '{}'",
            segment, SEGMENT_SEPARATOR
        )));
    }
    Ok(())
}

fn unescape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let escape = rest.get(at..at + 3);
        match escape {
            Some("%25") => out.push('%'),
            Some("%3A") => out.push(':'),
            _ => {
                return Err(Error::invalid_key(format!(
                    "malformed escape in identity suffix '{}'",
                    s
                )))
            }
        }
        rest = &rest[at + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Iri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Iri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for Iri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Iri::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Identities embedded in other records (links) are stored as their text form
impl FieldCodec for Iri {
    fn marshal_field(&self, wire: &str) -> Result<Item> {
        let mut sub = Item::new();
        if !self.is_empty() {
            sub.insert(wire.to_string(), Value::String(self.format()));
        }
        Ok(sub)
    }

    fn unmarshal_field(wire: &str, sub: &Item) -> Result<Self> {
        match sub.get(wire) {
            None | Some(Value::Null) => Ok(Iri::default()),
            Some(Value::String(s)) => Iri::parse(s),
            Some(other) => Err(Error::invalid_key(format!(
                "attribute '{}' holds {} instead of an identity",
                wire,
                other.type_name()
            ))),
        }
    }
}
