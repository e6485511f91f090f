use std::{future::Future, path::Path};

use aws_config::Region;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::{
    adapters::{self, ObjectStorage},
    config::S3Config,
    model::{
        error::StorageError,
        object::{self, ObjectMetadata, Payload},
        s3::S3Api,
    },
    util::{gzip, poll},
};

/// Flat key-value store adapter. Bucket names are passed through on every
/// call; there is nothing to cache.
pub struct S3Storage<C: S3Api = aws_sdk_s3::Client> {
    client: C,
    runtime: Runtime,
}

impl S3Storage<aws_sdk_s3::Client> {
    /// Builds a client from the ambient AWS configuration chain, with the
    /// region and endpoint overridden when configured.
    pub fn connect(config: &S3Config) -> Result<Self, StorageError> {
        let runtime = poll::new_runtime()?;

        let client = poll::poll_until_ready_error(&runtime, async {
            let mut loader = aws_config::from_env();
            if let Some(region) = &config.region {
                loader = loader.region(Region::new(region.clone()));
            }
            let sdk_config = loader.load().await;

            let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(config.force_path_style);
            if let Some(endpoint) = &config.endpoint_url {
                builder = builder.endpoint_url(endpoint);
            }

            Ok(aws_sdk_s3::Client::from_conf(builder.build()))
        })?;

        Ok(Self::with_client(client, runtime))
    }
}

impl<C: S3Api> S3Storage<C> {
    pub fn with_client(client: C, runtime: Runtime) -> Self {
        Self { client, runtime }
    }

    fn block<T>(&self, future: impl Future<Output = Result<T, StorageError>>) -> Result<T, StorageError> {
        poll::poll_until_ready_error(&self.runtime, future)
    }
}

impl<C: S3Api> ObjectStorage for S3Storage<C> {
    fn list_bucket_names(&self) -> Result<Vec<String>, StorageError> {
        self.block(self.client.list_buckets())
    }

    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        object::validate_key(key)?;
        self.block(self.client.put_object_from_path(bucket, key, source, metadata))
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
        self.block(self.client.put_object(bucket, key, body, metadata))
    }

    /// A missing key answers `false`; any other failure is an error.
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        object::validate_key(key)?;
        Ok(self.block(self.client.head_object(bucket, key))?.is_some())
    }

    /// Copy to `new_key`, then delete `key`. If the delete fails the object
    /// is visible under both keys until the caller reconciles.
    fn rename(&self, bucket: &str, key: &str, new_key: &str) -> Result<(), StorageError> {
        object::validate_rename(key, new_key)?;

        self.block(self.client.copy_object(bucket, key, new_key))?;
        debug!(bucket = bucket, key = key, new_key = new_key, "copied, deleting source");

        self.block(self.client.delete_object(bucket, key))
            .map_err(|err| adapters::rename_incomplete(self, bucket, key, new_key, err))
    }

    fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        gunzip: bool,
    ) -> Result<(), StorageError> {
        object::validate_key(key)?;

        if gunzip {
            let bytes = self.download(bucket, key, true)?;
            return adapters::write_through_partial(destination, |partial| {
                std::fs::write(partial, &bytes).map_err(|err| {
                    StorageError::from_io(err, &format!("failed to write {}", destination.display()))
                })
            });
        }

        adapters::write_through_partial(destination, |partial| {
            let (info, written) = self.block(self.client.get_object_to_path(bucket, key, partial))?;
            match info.size {
                Some(size) if size != written => Err(StorageError::Corruption(format!(
                    "short read of {}: expected {} bytes, got {}",
                    key, size, written
                ))),
                _ => Ok(()),
            }
        })
    }

    fn download(&self, bucket: &str, key: &str, gunzip: bool) -> Result<Vec<u8>, StorageError> {
        object::validate_key(key)?;
        let (info, body) = self.block(self.client.get_object(bucket, key))?;

        if let Some(size) = info.size {
            if size != body.len() as u64 {
                return Err(StorageError::Corruption(format!(
                    "short read of {}: expected {} bytes, got {}",
                    key,
                    size,
                    body.len()
                )));
            }
        }

        if !gunzip {
            return Ok(body);
        }

        adapters::require_gzip(key, &info.metadata)?;
        gzip::decompress(&body)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        object::validate_key(key)?;
        match self.block(self.client.delete_object(bucket, key)) {
            Err(err) if err.is_not_found() => Ok(()),
            res => res,
        }
    }

    fn metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        object::validate_key(key)?;
        self.block(self.client.head_object(bucket, key))?
            .map(|info| info.metadata)
            .ok_or_else(|| StorageError::NotFound(format!("no such object: {}", key)))
    }
}
