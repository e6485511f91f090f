use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fs,
    path::Path,
};

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::{
    model::{
        error::StorageError,
        gcs::{BucketHandle, GcsApi},
        object::{ObjectInfo, ObjectMetadata},
        s3::S3Api,
    },
    util::gzip,
};

#[derive(Clone, Debug)]
struct StoredObject {
    metadata: ObjectMetadata,
    body: Vec<u8>,
}

/// In-memory stand-in for both cloud seams, with a few injectable faults.
#[derive(Default)]
pub struct MockClient {
    buckets: RefCell<BTreeMap<String, BTreeMap<String, StoredObject>>>,
    /// Status returned by the next delete instead of deleting.
    pub fail_next_delete: Cell<Option<u16>>,
    /// Status returned by every call while set.
    pub fail_all: Cell<Option<u16>>,
    /// Serve gzip-encoded objects inflated, like decompressive transcoding.
    pub transcode_gzip: Cell<bool>,
    /// Flip one byte of the next body served.
    pub corrupt_next_body: Cell<bool>,
    /// Drop the second half of the next body served.
    pub truncate_next_body: Cell<bool>,
    pub get_bucket_calls: Cell<usize>,
}

impl MockClient {
    pub fn with_buckets(names: &[&str]) -> Self {
        let client = Self::default();
        for name in names {
            client
                .buckets
                .borrow_mut()
                .insert(name.to_string(), BTreeMap::new());
        }
        client
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.borrow().get(bucket).map(|b| b.len()).unwrap_or(0)
    }

    fn check_fault(&self) -> Result<(), StorageError> {
        match self.fail_all.get() {
            Some(status) => Err(StorageError::from_status(Some(status), format!("injected {}", status))),
            None => Ok(()),
        }
    }

    fn with_bucket<T, F>(&self, bucket: &str, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, StoredObject>) -> Result<T, StorageError>,
    {
        self.check_fault()?;
        let mut buckets = self.buckets.borrow_mut();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NotFound(format!("NoSuchBucket: {}", bucket)))?;
        f(objects)
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>, metadata: &ObjectMetadata) -> Result<(), StorageError> {
        self.with_bucket(bucket, |objects| {
            objects.insert(
                key.to_string(),
                StoredObject {
                    metadata: metadata.clone(),
                    body,
                },
            );
            Ok(())
        })
    }

    fn find(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        self.with_bucket(bucket, |objects| {
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(format!("NoSuchKey: {}", key)))
        })
    }

    fn info(object: &StoredObject) -> ObjectInfo {
        ObjectInfo {
            metadata: object.metadata.clone(),
            size: Some(object.body.len() as u64),
            md5: None,
        }
    }

    /// Body as it leaves the wire, after any injected damage.
    fn serve(&self, object: &StoredObject) -> Result<Vec<u8>, StorageError> {
        let mut body = if self.transcode_gzip.get() && object.metadata.is_gzip() {
            gzip::decompress(&object.body)?
        } else {
            object.body.clone()
        };

        if self.corrupt_next_body.replace(false) {
            if let Some(first) = body.first_mut() {
                *first ^= 0xff;
            }
        }
        if self.truncate_next_body.replace(false) {
            body.truncate(body.len() / 2);
        }

        Ok(body)
    }

    fn copy(&self, bucket: &str, key: &str, new_key: &str) -> Result<(), StorageError> {
        let object = self.find(bucket, key)?;
        self.with_bucket(bucket, |objects| {
            objects.insert(new_key.to_string(), object);
            Ok(())
        })
    }

    fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        if let Some(status) = self.fail_next_delete.take() {
            return Err(StorageError::from_status(Some(status), format!("injected {}", status)));
        }

        self.with_bucket(bucket, |objects| {
            objects
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(format!("NoSuchKey: {}", key)))
        })
    }

    fn bucket_names(&self) -> Result<Vec<String>, StorageError> {
        self.check_fault()?;
        Ok(self.buckets.borrow().keys().cloned().collect())
    }
}

fn ready<'a, T: 'a>(res: Result<T, StorageError>) -> LocalBoxFuture<'a, Result<T, StorageError>> {
    future::ready(res).boxed_local()
}

impl S3Api for MockClient {
    fn list_buckets(&self) -> LocalBoxFuture<'_, Result<Vec<String>, StorageError>> {
        ready(self.bucket_names())
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        ready(self.put(bucket, key, body, metadata))
    }

    fn put_object_from_path<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        source: &'a Path,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        let res = fs::read(source)
            .map_err(|err| StorageError::from_io(err, "failed to read source"))
            .and_then(|body| self.put(bucket, key, body, metadata));
        ready(res)
    }

    fn head_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<ObjectInfo>, StorageError>> {
        let res = match self.find(bucket, key) {
            Ok(object) => Ok(Some(Self::info(&object))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        };
        ready(res)
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(ObjectInfo, Vec<u8>), StorageError>> {
        let res = self
            .find(bucket, key)
            .and_then(|object| Ok((Self::info(&object), self.serve(&object)?)));
        ready(res)
    }

    fn get_object_to_path<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        destination: &'a Path,
    ) -> LocalBoxFuture<'a, Result<(ObjectInfo, u64), StorageError>> {
        let res = self.find(bucket, key).and_then(|object| {
            let body = self.serve(&object)?;
            fs::write(destination, &body)
                .map_err(|err| StorageError::from_io(err, "failed to write destination"))?;
            Ok((Self::info(&object), body.len() as u64))
        });
        ready(res)
    }

    fn copy_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        new_key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        ready(self.copy(bucket, key, new_key))
    }

    fn delete_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        // S3 answers 204 for missing keys.
        let res = match self.remove(bucket, key) {
            Err(err) if err.to_string().contains("NoSuchKey") => Ok(()),
            res => res,
        };
        ready(res)
    }
}

impl GcsApi for MockClient {
    fn list_bucket_names(&self) -> LocalBoxFuture<'_, Result<Vec<String>, StorageError>> {
        ready(self.bucket_names())
    }

    fn get_bucket<'a>(
        &'a self,
        bucket: &'a str,
    ) -> LocalBoxFuture<'a, Result<BucketHandle, StorageError>> {
        self.get_bucket_calls.set(self.get_bucket_calls.get() + 1);
        let res = self.with_bucket(bucket, |_| {
            Ok(BucketHandle {
                name: bucket.to_string(),
            })
        });
        ready(res)
    }

    fn upload_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
        body: Vec<u8>,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        ready(self.put(&bucket.name, key, body, metadata))
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<ObjectInfo, StorageError>> {
        let res = self.find(&bucket.name, key).map(|object| {
            let mut info = Self::info(&object);
            info.md5 = Some(md5_b64(&object.body));
            info
        });
        ready(res)
    }

    fn download_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<u8>, StorageError>> {
        let res = self
            .find(&bucket.name, key)
            .and_then(|object| self.serve(&object));
        ready(res)
    }

    fn copy_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
        new_key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        ready(self.copy(&bucket.name, key, new_key))
    }

    fn delete_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        ready(self.remove(&bucket.name, key))
    }
}

fn md5_b64(body: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use md5::{Digest, Md5};

    STANDARD.encode(Md5::digest(body))
}
