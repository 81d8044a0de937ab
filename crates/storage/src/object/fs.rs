//! Directory-backed object store
//!
//! Layout: `<root>/<bucket>/<object>`, one file per object. Bucket and object
//! keys are percent-escaped into flat file names (every byte outside
//! `[A-Za-z0-9_-]` becomes `%XX`), so escaped names never contain `.` and
//! the `.tmp` files of in-progress writes are never listed.

use super::{Listing, ObjectClient, ObjectError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

const TMP_SUFFIX: &str = ".tmp";

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsBucket {
    root: PathBuf,
}

impl FsBucket {
    /// Store objects below `root`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ObjectError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, ObjectError> {
        if bucket.is_empty() {
            return Err(ObjectError::InvalidKey("bucket name cannot be empty".into()));
        }
        Ok(self.root.join(escape(bucket)))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ObjectError> {
        if key.is_empty() {
            return Err(ObjectError::InvalidKey("object key cannot be empty".into()));
        }
        Ok(self.bucket_dir(bucket)?.join(escape(key)))
    }
}

fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'.' => return None,
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

impl ObjectClient for FsBucket {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, ObjectError> {
        match fs::read(self.object_path(bucket, key)?) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), ObjectError> {
        let path = self.object_path(bucket, key)?;
        fs::create_dir_all(self.bucket_dir(bucket)?)?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        trace!(target: "keyfold::object", path = %path.display(), bytes = body.len(), "Wrote object file");
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectError> {
        match fs::remove_file(self.object_path(bucket, key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<Listing, ObjectError> {
        let entries = match fs::read_dir(self.bucket_dir(bucket)?) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Listing::default()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(key) = entry.file_name().to_str().and_then(unescape) else {
                continue;
            };
            if key.starts_with(prefix) && start_after.map_or(true, |after| key.as_str() > after) {
                keys.push(key);
            }
        }
        keys.sort();

        let truncated = keys.len() > max_keys;
        keys.truncate(max_keys);
        Ok(Listing { keys, truncated })
    }
}
