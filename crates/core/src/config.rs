//! Store configuration
//!
//! [`Config`] names the backend collection and the wire shape of keys. The
//! defaults match the canonical table layout: hash key `prefix`, sort key
//! `suffix`, object keys joined with `/_/`.

use crate::error::{Error, Result};

/// Default hash-key attribute name
pub const DEFAULT_HASH_KEY: &str = "prefix";

/// Default sort-key attribute name
pub const DEFAULT_SORT_KEY: &str = "suffix";

/// Default separator between hash and sort key in object keys
pub const DEFAULT_OBJECT_SEPARATOR: &str = "/_/";

/// Default upper bound on a requested page size
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// Configuration shared by the codec and the storage adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Table or bucket name
    pub collection: String,

    /// Hash-key attribute name (default: `prefix`)
    pub hash_key: String,

    /// Sort-key attribute name (default: `suffix`)
    pub sort_key: String,

    /// Page size of streaming queries (default: backend decides)
    pub page_size: Option<usize>,

    /// Largest page a caller may request (default: 1000)
    pub max_page_size: usize,

    /// Separator between hash and sort key in object keys (default: `/_/`)
    pub object_separator: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            collection: String::new(),
            hash_key: DEFAULT_HASH_KEY.to_string(),
            sort_key: DEFAULT_SORT_KEY.to_string(),
            page_size: None,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            object_separator: DEFAULT_OBJECT_SEPARATOR.to_string(),
        }
    }
}

impl Config {
    /// Configuration for a named table or bucket
    pub fn new(collection: impl Into<String>) -> Self {
        Config {
            collection: collection.into(),
            ..Config::default()
        }
    }

    /// Override the key attribute names
    pub fn with_key_attributes(
        mut self,
        hash_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        self.hash_key = hash_key.into();
        self.sort_key = sort_key.into();
        self
    }

    /// Set the page size used by streaming queries
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the largest page a caller may request
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Set the object key separator
    pub fn with_object_separator(mut self, separator: impl Into<String>) -> Self {
        self.object_separator = separator.into();
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.hash_key.is_empty() || self.sort_key.is_empty() {
            return Err(Error::invalid_operation(
                "key attribute names cannot be empty",
            ));
        }
        if self.hash_key == self.sort_key {
            return Err(Error::invalid_operation(format!(
                "hash and sort key share the attribute name '{}'",
                self.hash_key
            )));
        }
        if self.max_page_size == 0 {
            return Err(Error::invalid_operation("max_page_size must be positive"));
        }
        if let Some(size) = self.page_size {
            if size == 0 || size > self.max_page_size {
                return Err(Error::invalid_operation(format!(
                    "page_size {} outside 1..={}",
                    size, self.max_page_size
                )));
            }
        }
        if self.object_separator.is_empty() {
            return Err(Error::invalid_operation("object separator cannot be empty"));
        }
        Ok(())
    }

    /// Clamp a requested page size to the configured maximum
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a zero page size.
    pub fn page_limit(&self, requested: usize) -> Result<usize> {
        if requested == 0 {
            return Err(Error::invalid_operation("page size must be positive"));
        }
        Ok(requested.min(self.max_page_size))
    }

    /// Attribute names of the key, hash first
    pub fn key_attributes(&self) -> [&str; 2] {
        [&self.hash_key, &self.sort_key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.hash_key, "prefix");
        assert_eq!(config.sort_key, "suffix");
        assert_eq!(config.page_size, None);
        assert_eq!(config.max_page_size, 1000);
        assert_eq!(config.object_separator, "/_/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = Config::new("things")
            .with_key_attributes("pk", "sk")
            .with_page_size(25)
            .with_max_page_size(100);

        assert_eq!(config.collection, "things");
        assert_eq!(config.key_attributes(), ["pk", "sk"]);
        assert_eq!(config.page_size, Some(25));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_same_key_names() {
        let config = Config::default().with_key_attributes("id", "id");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_page() {
        let config = Config::default().with_max_page_size(10).with_page_size(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_limit_clamps() {
        let config = Config::default().with_max_page_size(10);
        assert_eq!(config.page_limit(3).unwrap(), 3);
        assert_eq!(config.page_limit(50).unwrap(), 10);
        assert!(config.page_limit(0).is_err());
    }
}
