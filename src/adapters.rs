use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::model::{
    error::StorageError,
    object::{ObjectMetadata, Payload},
};

pub mod gcs;
pub mod local;
#[cfg(test)]
pub mod mock;
pub mod s3;

/// Operations every backend adapter supports.
///
/// All calls block the caller until the backend answers. Failures are
/// normalized into `StorageError`; nothing is retried or logged on the
/// caller's behalf.
pub trait ObjectStorage {
    /// Bucket names visible to the adapter's credentials.
    fn list_bucket_names(&self) -> Result<Vec<String>, StorageError>;

    /// Uploads the file at `source`, overwriting any object at `key`.
    /// The bytes are stored as they are; `metadata` is only recorded.
    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Uploads `content`, which must be `Payload::Bytes`.
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        content: Payload,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Moves `key` to `new_key`. Not atomic on the cloud backends: see
    /// `StorageError::RenameIncomplete` for the partial-failure report.
    fn rename(&self, bucket: &str, key: &str, new_key: &str) -> Result<(), StorageError>;

    /// Writes the object to `destination`. A file left by a failed
    /// download is removed.
    fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        gunzip: bool,
    ) -> Result<(), StorageError>;

    /// Returns the stored bytes, or the inflated bytes when `gunzip` is set
    /// (which requires the object to be stored with a `gzip` encoding).
    fn download(&self, bucket: &str, key: &str, gunzip: bool) -> Result<Vec<u8>, StorageError>;

    /// Removes the object. Removing a missing object succeeds.
    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    fn metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Reads an object that must have been stored gzip-encoded, returning the
    /// compressed bytes or, with `decode`, the inflated payload.
    fn download_gzipped(
        &self,
        bucket: &str,
        key: &str,
        decode: bool,
    ) -> Result<Vec<u8>, StorageError> {
        require_gzip(key, &self.metadata(bucket, key)?)?;
        self.download(bucket, key, decode)
    }
}

pub(crate) fn require_gzip(key: &str, metadata: &ObjectMetadata) -> Result<(), StorageError> {
    if !metadata.is_gzip() {
        return Err(StorageError::InvalidArgument(format!(
            "object is not gzipped: {} (content-encoding: {})",
            key,
            metadata.content_encoding.as_deref().unwrap_or("none")
        )));
    }

    Ok(())
}

/// Probes both keys after the second step of a two-step rename failed.
pub(crate) fn rename_incomplete<S: ObjectStorage + ?Sized>(
    storage: &S,
    bucket: &str,
    key: &str,
    new_key: &str,
    cause: StorageError,
) -> StorageError {
    StorageError::RenameIncomplete {
        from: key.to_string(),
        to: new_key.to_string(),
        source_present: storage.exists(bucket, key).ok(),
        destination_present: storage.exists(bucket, new_key).ok(),
        cause: Box::new(cause),
    }
}

pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

pub(crate) fn discard_partial(partial: &Path) {
    if let Err(err) = fs::remove_file(partial) {
        tracing::debug!(path = %partial.display(), error_message = %err, "no partial file to remove");
    }
}

/// Runs `write` against a sibling partial file and moves it over
/// `destination` once complete. On failure the partial file is removed and
/// `destination` is left as it was.
pub(crate) fn write_through_partial<F>(destination: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&Path) -> Result<(), StorageError>,
{
    let partial = partial_path(destination);

    if let Err(err) = write(&partial) {
        discard_partial(&partial);
        return Err(err);
    }

    fs::rename(&partial, destination).map_err(|err| {
        discard_partial(&partial);
        StorageError::from_io(err, &format!("failed to write {}", destination.display()))
    })
}
