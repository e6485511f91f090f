use futures::future::{FutureExt, LocalBoxFuture};
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::{
        buckets::{get::GetBucketRequest, list::ListBucketsRequest},
        objects::{
            copy::CopyObjectRequest,
            delete::DeleteObjectRequest,
            download::Range,
            get::GetObjectRequest,
            upload::{UploadObjectRequest, UploadType},
            Object,
        },
        Error,
    },
};

use crate::{
    config::GcsConfig,
    model::{
        error::StorageError,
        object::{ObjectInfo, ObjectMetadata},
    },
};

/// Result of the one remote bucket lookup the adapter caches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketHandle {
    pub name: String,
}

/// The slice of the Cloud Storage JSON API the adapter needs.
pub trait GcsApi {
    fn list_bucket_names(&self) -> LocalBoxFuture<'_, Result<Vec<String>, StorageError>>;

    fn get_bucket<'a>(&'a self, bucket: &'a str)
        -> LocalBoxFuture<'a, Result<BucketHandle, StorageError>>;

    fn upload_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
        body: Vec<u8>,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    /// Object metadata; `NotFound` when the key does not exist.
    fn get_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<ObjectInfo, StorageError>>;

    /// Object body after transport-level decompressive transcoding.
    fn download_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<u8>, StorageError>>;

    fn copy_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
        new_key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    fn delete_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;
}

/// `google_cloud_storage` client plus the project used for bucket listing.
pub struct GcsClient {
    client: Client,
    project_id: String,
}

impl GcsClient {
    pub async fn connect(config: &GcsConfig) -> Result<Self, StorageError> {
        let mut client_config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|err| StorageError::Unknown(format!("failed to load gcs credentials, {}", err)))?;

        if let Some(endpoint) = &config.endpoint {
            client_config.storage_endpoint = endpoint.clone();
        }

        let project_id = config
            .project_id
            .clone()
            .or_else(|| client_config.project_id.clone())
            .unwrap_or_default();

        Ok(Self {
            client: Client::new(client_config),
            project_id,
        })
    }
}

fn gcs_error(err: Error, context: String) -> StorageError {
    let status = match &err {
        Error::Response(res) => Some(res.code),
        _ => None,
    };
    StorageError::from_status(status, format!("{}, {}", context, err))
}

impl GcsApi for GcsClient {
    fn list_bucket_names(&self) -> LocalBoxFuture<'_, Result<Vec<String>, StorageError>> {
        async move {
            let mut names = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let req = ListBucketsRequest {
                    project: self.project_id.clone(),
                    page_token: page_token.clone(),
                    ..Default::default()
                };

                let lb = self
                    .client
                    .list_buckets(&req)
                    .await
                    .map_err(|err| gcs_error(err, "failed to list_buckets".to_string()))?;

                names.extend(lb.items.into_iter().map(|b| b.name));

                page_token = lb.next_page_token;
                if page_token.is_none() {
                    break;
                }
            }

            Ok(names)
        }
        .boxed_local()
    }

    fn get_bucket<'a>(
        &'a self,
        bucket: &'a str,
    ) -> LocalBoxFuture<'a, Result<BucketHandle, StorageError>> {
        async move {
            let req = GetBucketRequest {
                bucket: bucket.to_string(),
                ..Default::default()
            };

            let b = self
                .client
                .get_bucket(&req)
                .await
                .map_err(|err| gcs_error(err, format!("failed to get_bucket: {}", bucket)))?;

            Ok(BucketHandle { name: b.name })
        }
        .boxed_local()
    }

    fn upload_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
        body: Vec<u8>,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            let req = UploadObjectRequest {
                bucket: bucket.name.clone(),
                ..Default::default()
            };

            let object = Object {
                name: key.to_string(),
                content_type: metadata.content_type.clone(),
                content_encoding: metadata.content_encoding.clone(),
                ..Default::default()
            };

            self.client
                .upload_object(&req, body, &UploadType::Multipart(Box::new(object)))
                .await
                .map_err(|err| gcs_error(err, format!("failed to upload_object at: {}", key)))?;

            Ok(())
        }
        .boxed_local()
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<ObjectInfo, StorageError>> {
        async move {
            let req = GetObjectRequest {
                bucket: bucket.name.clone(),
                object: key.to_string(),
                ..Default::default()
            };

            let o = self
                .client
                .get_object(&req)
                .await
                .map_err(|err| gcs_error(err, format!("failed to get_object: {}", key)))?;

            Ok(ObjectInfo {
                metadata: ObjectMetadata {
                    content_type: o.content_type,
                    content_encoding: o.content_encoding,
                },
                size: u64::try_from(o.size).ok(),
                md5: o.md5_hash,
            })
        }
        .boxed_local()
    }

    fn download_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<u8>, StorageError>> {
        async move {
            let req = GetObjectRequest {
                bucket: bucket.name.clone(),
                object: key.to_string(),
                ..Default::default()
            };

            self.client
                .download_object(&req, &Range::default())
                .await
                .map_err(|err| gcs_error(err, format!("failed to download_object: {}", key)))
        }
        .boxed_local()
    }

    fn copy_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
        new_key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            let req = CopyObjectRequest {
                source_bucket: bucket.name.clone(),
                source_object: key.to_string(),
                destination_bucket: bucket.name.clone(),
                destination_object: new_key.to_string(),
                ..Default::default()
            };

            self.client.copy_object(&req).await.map_err(|err| {
                gcs_error(err, format!("failed to copy_object: {} to {}", key, new_key))
            })?;

            Ok(())
        }
        .boxed_local()
    }

    fn delete_object<'a>(
        &'a self,
        bucket: &'a BucketHandle,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            let req = DeleteObjectRequest {
                bucket: bucket.name.clone(),
                object: key.to_string(),
                ..Default::default()
            };

            self.client
                .delete_object(&req)
                .await
                .map_err(|err| gcs_error(err, format!("failed to delete_object: {}", key)))
        }
        .boxed_local()
    }
}
