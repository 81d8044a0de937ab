//! In-process object store

use super::{Listing, ObjectClient, ObjectError};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Buckets of objects held in memory
///
/// Buckets are created on first write; reading or listing a bucket that was
/// never written returns nothing.
#[derive(Debug, Default)]
pub struct MemoryBucket {
    objects: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBucket {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects in `bucket`
    pub fn len(&self, bucket: &str) -> usize {
        self.objects.read().get(bucket).map_or(0, BTreeMap::len)
    }
}

impl ObjectClient for MemoryBucket {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, ObjectError> {
        Ok(self
            .objects
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned())
    }

    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), ObjectError> {
        self.objects
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body);
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectError> {
        if let Some(objects) = self.objects.write().get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<Listing, ObjectError> {
        let guard = self.objects.read();
        let Some(objects) = guard.get(bucket) else {
            return Ok(Listing::default());
        };

        let mut keys: Vec<String> = objects
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .filter(|key| start_after.map_or(true, |after| key.as_str() > after))
            .take(max_keys.saturating_add(1))
            .cloned()
            .collect();
        let truncated = keys.len() > max_keys;
        keys.truncate(max_keys);
        Ok(Listing { keys, truncated })
    }
}
