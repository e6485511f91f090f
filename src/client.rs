use crate::{
    adapters::{gcs::GcsStorage, local::LocalStorage, s3::S3Storage, ObjectStorage},
    config::StorageConfig,
    model::error::StorageError,
    util::object::Backend,
};

/// Constructs the adapter for `backend`. Cloud adapters resolve credentials
/// from their native ambient configuration.
pub fn create_storage_client(
    backend: Backend,
    config: &StorageConfig,
) -> Result<Box<dyn ObjectStorage>, StorageError> {
    let storage: Box<dyn ObjectStorage> = match backend {
        Backend::Gcs => Box::new(GcsStorage::connect(&config.gcs)?),
        Backend::Local => Box::new(LocalStorage::new(config.local_root.clone())?),
        Backend::S3 => Box::new(S3Storage::connect(&config.s3)?),
    };

    Ok(storage)
}

/// Same as `create_storage_client`, from a backend token such as `"s3"`.
pub fn create_storage_client_by_name(
    name: &str,
    config: &StorageConfig,
) -> Result<Box<dyn ObjectStorage>, StorageError> {
    create_storage_client(name.parse()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::mock::MockClient,
        model::{error::ErrorKind, object::ObjectMetadata},
        util::{gzip, poll},
    };

    const BUCKET: &str = "cloud-storage-test";
    const KEY: &str = "1/2/3/4.txt";

    #[test]
    fn test_unsupported_backend() {
        let err = create_storage_client_by_name("azure", &StorageConfig::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedBackend);
    }

    #[test]
    fn test_local_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            local_root: dir.path().join("root"),
            ..Default::default()
        };

        let storage = create_storage_client_by_name("local", &config).unwrap();
        storage
            .upload(BUCKET, KEY, b"hello world".into(), &ObjectMetadata::new())
            .unwrap();
        assert!(storage.exists(BUCKET, KEY).unwrap());
    }

    /// Behaviour every adapter has to share, whatever the backend.
    fn check_contract(storage: &dyn ObjectStorage) {
        let meta = ObjectMetadata::new();

        storage.upload(BUCKET, KEY, b"hello world".into(), &meta).unwrap();
        assert!(storage.exists(BUCKET, KEY).unwrap());
        assert_eq!(storage.download(BUCKET, KEY, false).unwrap(), b"hello world");

        let err = storage
            .upload(BUCKET, "text.txt", "hello world".into(), &meta)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);
        assert!(!storage.exists(BUCKET, "text.txt").unwrap());

        let gz = gzip::compress(b"payload").unwrap();
        storage
            .upload(BUCKET, "gz", gz.into(), &ObjectMetadata::new().with_content_encoding("gzip"))
            .unwrap();
        assert_eq!(storage.download(BUCKET, "gz", true).unwrap(), b"payload");
        let raw = storage.download(BUCKET, "gz", false).unwrap();
        assert_eq!(gzip::decompress(&raw).unwrap(), b"payload");

        let err = storage.rename(BUCKET, KEY, KEY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        storage.rename(BUCKET, KEY, "renamed").unwrap();
        assert!(!storage.exists(BUCKET, KEY).unwrap());
        assert!(storage.exists(BUCKET, "renamed").unwrap());

        storage.delete(BUCKET, "renamed").unwrap();
        assert!(!storage.exists(BUCKET, "renamed").unwrap());
        storage.delete(BUCKET, "renamed").unwrap();

        let err = storage.download(BUCKET, "renamed", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_contract_local() {
        let dir = tempfile::tempdir().unwrap();
        check_contract(&LocalStorage::new(dir.path()).unwrap());
    }

    #[test]
    fn test_contract_s3() {
        check_contract(&S3Storage::with_client(
            MockClient::with_buckets(&[BUCKET]),
            poll::new_runtime().unwrap(),
        ));
    }

    #[test]
    fn test_contract_gcs() {
        let client = MockClient::with_buckets(&[BUCKET]);
        client.transcode_gzip.set(true);
        check_contract(&GcsStorage::with_client(client, poll::new_runtime().unwrap()));
    }
}
