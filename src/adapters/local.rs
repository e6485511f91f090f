use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    adapters::{self, ObjectStorage},
    model::{
        error::StorageError,
        object::{self, ObjectMetadata, Payload},
    },
    util::{cache::BucketCache, digest, gzip},
};

const META_EXTENSION: &str = "meta";
const PARTIAL_EXTENSION: &str = "partial";
const META_PARTIAL_EXTENSION: &str = "meta.partial";

/// Filesystem-backed storage for development and tests.
///
/// Layout: `<root>/<bucket>/<sha256(key)>` holds the bytes and a sibling
/// `.meta` file holds the JSON `ObjectMetadata`. File names are one-way, so
/// the tree cannot be browsed by key.
pub struct LocalStorage {
    root_dir: PathBuf,
    buckets: BucketCache<PathBuf>,
}

impl LocalStorage {
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root_dir = root_dir.into();
        fs::create_dir_all(&root_dir).map_err(|err| {
            StorageError::from_io(err, &format!("failed to create root {}", root_dir.display()))
        })?;

        Ok(Self {
            root_dir,
            buckets: BucketCache::new(),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let path = self.bucket_path(bucket)?;
        match fs::create_dir(&path) {
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(StorageError::InvalidRequest(format!("bucket already exists: {}", bucket)))
            }
            Err(err) => Err(StorageError::from_io(err, &format!("failed to create bucket {}", bucket))),
            Ok(()) => {
                self.buckets.insert(bucket, path);
                Ok(())
            }
        }
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains(|c: char| c == '/' || c == '\\') {
            return Err(StorageError::InvalidArgument(format!(
                "invalid bucket name: {:?}",
                bucket
            )));
        }

        Ok(self.root_dir.join(bucket))
    }

    /// Bucket directory, created on first use.
    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        let path = self.bucket_path(bucket)?;
        self.buckets.get_or_try_insert_with(bucket, || {
            debug!(bucket = bucket, path = %path.display(), "ensuring bucket directory");
            fs::create_dir_all(&path).map_err(|err| {
                StorageError::from_io(err, &format!("failed to create bucket {}", bucket))
            })?;
            Ok(path)
        })
    }

    /// Resolves `(bucket, key)` to the file holding the object's bytes.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        object::validate_key(key)?;
        Ok(self.bucket_dir(bucket)?.join(digest::key_file_name(key)))
    }

    fn read_object(&self, path: &Path, key: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|err| StorageError::from_io(err, &format!("failed to read {}", key)))
    }

    fn read_metadata(&self, path: &Path, key: &str) -> Result<ObjectMetadata, StorageError> {
        let raw = match fs::read(path.with_extension(META_EXTENSION)) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ObjectMetadata::default()),
            Err(err) => {
                return Err(StorageError::from_io(err, &format!("failed to read metadata of {}", key)))
            }
            Ok(raw) => raw,
        };

        serde_json::from_slice(&raw).map_err(|err| {
            StorageError::Corruption(format!("unreadable metadata of {}: {}", key, err))
        })
    }

    /// Writes the bytes and the sidecar through partial files, then renames
    /// the data before the sidecar. Readers never observe a half-written
    /// object, and a failed commit leaves the previous sidecar in place.
    fn commit<F>(
        &self,
        path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
        write: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let partial = path.with_extension(PARTIAL_EXTENSION);
        let context = format!("failed to write {}", key);

        if let Err(err) = write(&partial) {
            adapters::discard_partial(&partial);
            return Err(StorageError::from_io(err, &context));
        }

        let meta = match serde_json::to_vec(metadata) {
            Err(err) => {
                adapters::discard_partial(&partial);
                return Err(StorageError::Unknown(format!("{}: {}", context, err)));
            }
            Ok(meta) => meta,
        };
        let meta_partial = path.with_extension(META_PARTIAL_EXTENSION);

        fs::write(&meta_partial, meta)
            .and_then(|_| fs::rename(&partial, path))
            .and_then(|_| fs::rename(&meta_partial, path.with_extension(META_EXTENSION)))
            .map_err(|err| {
                adapters::discard_partial(&partial);
                adapters::discard_partial(&meta_partial);
                StorageError::from_io(err, &context)
            })
    }

    fn stat(path: &Path, key: &str) -> Result<bool, StorageError> {
        path.try_exists()
            .map_err(|err| StorageError::from_io(err, &format!("failed to stat {}", key)))
    }

    fn remove_if_present(path: &Path, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::from_io(err, &format!("failed to delete {}", key))),
            Ok(()) => Ok(()),
        }
    }
}

impl ObjectStorage for LocalStorage {
    fn list_bucket_names(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.root_dir)
            .map_err(|err| StorageError::from_io(err, "failed to list buckets"))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StorageError::from_io(err, "failed to list buckets"))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        Ok(names)
    }

    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        fs::metadata(source).map_err(|err| {
            StorageError::from_io(err, &format!("failed to stat {}", source.display()))
        })?;

        let path = self.object_path(bucket, key)?;
        self.commit(&path, key, metadata, |partial| fs::copy(source, partial).map(|_| ()))
    }

    fn upload(
        &self,
        bucket: &str,
        key: &str,
        content: Payload,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let bytes = content.into_bytes()?;
        let path = self.object_path(bucket, key)?;
        self.commit(&path, key, metadata, |partial| fs::write(partial, &bytes))
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(bucket, key)?;
        Self::stat(&path, key)
    }

    fn rename(&self, bucket: &str, key: &str, new_key: &str) -> Result<(), StorageError> {
        object::validate_rename(key, new_key)?;
        let from = self.object_path(bucket, key)?;
        let to = self.object_path(bucket, new_key)?;

        fs::rename(&from, &to)
            .map_err(|err| StorageError::from_io(err, &format!("failed to rename {}", key)))?;

        let from_meta = from.with_extension(META_EXTENSION);
        let to_meta = to.with_extension(META_EXTENSION);
        let moved = match fs::rename(&from_meta, &to_meta) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::remove_if_present(&to_meta, new_key),
            Err(err) => Err(StorageError::from_io(err, &format!("failed to rename metadata of {}", key))),
            Ok(()) => Ok(()),
        };

        moved.map_err(|err| adapters::rename_incomplete(self, bucket, key, new_key, err))
    }

    fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        gunzip: bool,
    ) -> Result<(), StorageError> {
        let context = format!("failed to write {}", destination.display());

        if gunzip {
            let bytes = self.download(bucket, key, true)?;
            return adapters::write_through_partial(destination, |partial| {
                fs::write(partial, &bytes).map_err(|err| StorageError::from_io(err, &context))
            });
        }

        let path = self.object_path(bucket, key)?;
        if !Self::stat(&path, key)? {
            return Err(StorageError::NotFound(format!("no such object: {}", key)));
        }

        adapters::write_through_partial(destination, |partial| {
            fs::copy(&path, partial)
                .map(|_| ())
                .map_err(|err| StorageError::from_io(err, &context))
        })
    }

    fn download(&self, bucket: &str, key: &str, gunzip: bool) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        let bytes = self.read_object(&path, key)?;

        if !gunzip {
            return Ok(bytes);
        }

        adapters::require_gzip(key, &self.read_metadata(&path, key)?)?;
        gzip::decompress(&bytes)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        Self::remove_if_present(&path, key)?;
        Self::remove_if_present(&path.with_extension(META_EXTENSION), key)
    }

    fn metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let path = self.object_path(bucket, key)?;
        if !Self::stat(&path, key)? {
            return Err(StorageError::NotFound(format!("no such object: {}", key)));
        }

        self.read_metadata(&path, key)
    }
}
