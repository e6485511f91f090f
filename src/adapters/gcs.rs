use std::{fs, future::Future, path::Path};

use tokio::runtime::Runtime;
use tracing::debug;

use crate::{
    adapters::{self, ObjectStorage},
    config::GcsConfig,
    model::{
        error::StorageError,
        gcs::{BucketHandle, GcsApi, GcsClient},
        object::{self, ObjectMetadata, Payload},
    },
    util::{cache::BucketCache, digest, gzip, poll},
};

/// Hierarchical blob store adapter.
///
/// The first call touching a bucket looks it up once and keeps the handle for
/// the adapter's lifetime. The handle cache makes the adapter `!Sync`.
pub struct GcsStorage<C: GcsApi = GcsClient> {
    client: C,
    runtime: Runtime,
    buckets: BucketCache<BucketHandle>,
}

impl GcsStorage<GcsClient> {
    pub fn connect(config: &GcsConfig) -> Result<Self, StorageError> {
        let runtime = poll::new_runtime()?;
        let client = poll::poll_until_ready_error(&runtime, GcsClient::connect(config))?;

        Ok(Self::with_client(client, runtime))
    }
}

impl<C: GcsApi> GcsStorage<C> {
    pub fn with_client(client: C, runtime: Runtime) -> Self {
        Self {
            client,
            runtime,
            buckets: BucketCache::new(),
        }
    }

    fn block<T>(&self, future: impl Future<Output = Result<T, StorageError>>) -> Result<T, StorageError> {
        poll::poll_until_ready_error(&self.runtime, future)
    }

    fn bucket(&self, bucket: &str) -> Result<BucketHandle, StorageError> {
        self.buckets
            .get_or_try_insert_with(bucket, || self.block(self.client.get_bucket(bucket)))
    }

    /// Fetches the body and reconciles it with the stored encoding.
    ///
    /// The transport inflates gzip-encoded objects on the way down. A
    /// gzip-encoded body whose length differs from the stored size was
    /// transcoded; without a stored size, a body missing the gzip magic was.
    /// Raw reads re-compress transcoded bodies, and the MD5 check only
    /// applies to untranscoded ones.
    fn fetch(&self, bucket: &str, key: &str, gunzip: bool) -> Result<Vec<u8>, StorageError> {
        object::validate_key(key)?;
        let handle = self.bucket(bucket)?;
        let info = self.block(self.client.get_object(&handle, key))?;

        if gunzip {
            adapters::require_gzip(key, &info.metadata)?;
        }

        let body = self.block(self.client.download_object(&handle, key))?;
        let transcoded = info.metadata.is_gzip() && is_transcoded(&body, info.size);

        if !transcoded {
            if let Some(md5) = &info.md5 {
                digest::verify_md5(key, &body, md5)?;
            }
        }

        match (gunzip, transcoded) {
            (false, false) | (true, true) => Ok(body),
            (false, true) => gzip::compress(&body),
            (true, false) => gzip::decompress(&body),
        }
    }
}

fn is_transcoded(body: &[u8], stored_size: Option<u64>) -> bool {
    match stored_size {
        Some(size) => body.len() as u64 != size,
        None => !gzip::is_gzip(body),
    }
}

impl<C: GcsApi> ObjectStorage for GcsStorage<C> {
    fn list_bucket_names(&self) -> Result<Vec<String>, StorageError> {
        self.block(self.client.list_bucket_names())
    }

    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        object::validate_key(key)?;
        let body = fs::read(source).map_err(|err| {
            StorageError::from_io(err, &format!("failed to read {}", source.display()))
        })?;

        let handle = self.bucket(bucket)?;
        self.block(self.client.upload_object(&handle, key, body, metadata))
    }

    fn upload(
        &self,
        bucket: &str,
        key: &str,
        content: Payload,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let body = content.into_bytes()?;
        object::validate_key(key)?;

        let handle = self.bucket(bucket)?;
        self.block(self.client.upload_object(&handle, key, body, metadata))
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        object::validate_key(key)?;
        let handle = self.bucket(bucket)?;

        match self.block(self.client.get_object(&handle, key)) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Server-side copy followed by delete of the source. If the delete fails
    /// both keys stay visible; the error reports what each key looks like.
    fn rename(&self, bucket: &str, key: &str, new_key: &str) -> Result<(), StorageError> {
        object::validate_rename(key, new_key)?;
        let handle = self.bucket(bucket)?;

        self.block(self.client.copy_object(&handle, key, new_key))?;
        debug!(bucket = bucket, key = key, new_key = new_key, "copied, deleting source");

        self.block(self.client.delete_object(&handle, key))
            .map_err(|err| adapters::rename_incomplete(self, bucket, key, new_key, err))
    }

    fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        gunzip: bool,
    ) -> Result<(), StorageError> {
        adapters::write_through_partial(destination, |partial| {
            let bytes = self.fetch(bucket, key, gunzip)?;
            fs::write(partial, bytes).map_err(|err| {
                StorageError::from_io(err, &format!("failed to write {}", destination.display()))
            })
        })
    }

    fn download(&self, bucket: &str, key: &str, gunzip: bool) -> Result<Vec<u8>, StorageError> {
        self.fetch(bucket, key, gunzip)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        object::validate_key(key)?;
        let handle = self.bucket(bucket)?;

        match self.block(self.client.delete_object(&handle, key)) {
            Err(err) if err.is_not_found() => Ok(()),
            res => res,
        }
    }

    fn metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        object::validate_key(key)?;
        let handle = self.bucket(bucket)?;
        Ok(self.block(self.client.get_object(&handle, key))?.metadata)
    }
}
