use std::{cell::RefCell, collections::HashMap};

use tracing::debug;

use crate::model::error::StorageError;

/// Lazily populated bucket-name to handle memo, kept for the owner's lifetime.
///
/// Single writer per instance: the cache is `!Sync`, so an adapter holding one
/// cannot be shared across threads. Use one adapter per thread, or wrap the
/// adapter in a `Mutex` when sharing is needed.
pub struct BucketCache<H> {
    handles: RefCell<HashMap<String, H>>,
}

impl<H: Clone> BucketCache<H> {
    pub fn new() -> Self {
        Self {
            handles: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the cached handle, or runs `populate` once and remembers its result.
    /// A failed population is not cached.
    pub fn get_or_try_insert_with<F>(&self, bucket: &str, populate: F) -> Result<H, StorageError>
    where
        F: FnOnce() -> Result<H, StorageError>,
    {
        if let Some(handle) = self.handles.borrow().get(bucket) {
            return Ok(handle.clone());
        }

        debug!(bucket = bucket, "bucket cache miss");
        let handle = populate()?;
        self.handles
            .borrow_mut()
            .insert(bucket.to_string(), handle.clone());

        Ok(handle)
    }

    pub fn insert(&self, bucket: &str, handle: H) {
        self.handles.borrow_mut().insert(bucket.to_string(), handle);
    }

    #[cfg(test)]
    fn contains(&self, bucket: &str) -> bool {
        self.handles.borrow().contains_key(bucket)
    }
}

impl<H: Clone> Default for BucketCache<H> {
    fn default() -> Self {
        Self::new()
    }
}
