use std::path::Path;

use aws_sdk_s3::{
    config::http::HttpResponse,
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::ChecksumMode,
};
use futures::future::{FutureExt, LocalBoxFuture};
use tokio::io::AsyncWriteExt;

use crate::model::{
    error::StorageError,
    object::{ObjectInfo, ObjectMetadata},
};

/// The slice of the S3 API the adapter needs. Every failure is already
/// normalized into `StorageError` when it crosses this seam.
pub trait S3Api {
    fn list_buckets(&self) -> LocalBoxFuture<'_, Result<Vec<String>, StorageError>>;

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    fn put_object_from_path<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        source: &'a Path,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    /// `None` when the key does not exist.
    fn head_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<ObjectInfo>, StorageError>>;

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(ObjectInfo, Vec<u8>), StorageError>>;

    /// Streams the body into `destination`, returning the number of bytes written.
    fn get_object_to_path<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        destination: &'a Path,
    ) -> LocalBoxFuture<'a, Result<(ObjectInfo, u64), StorageError>>;

    fn copy_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        new_key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    fn delete_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>>;
}

fn sdk_error<E>(err: SdkError<E, HttpResponse>, context: String) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|res| res.status().as_u16());
    StorageError::from_status(status, format!("{}, {}", context, DisplayErrorContext(&err)))
}

fn body_error(err: impl std::fmt::Display, key: &str) -> StorageError {
    let message = format!("failed to read body: {}, {}", key, err);
    if message.to_lowercase().contains("checksum") {
        StorageError::Corruption(message)
    } else {
        StorageError::Unknown(message)
    }
}

fn object_info(
    content_type: Option<&str>,
    content_encoding: Option<&str>,
    content_length: Option<i64>,
) -> ObjectInfo {
    ObjectInfo {
        metadata: ObjectMetadata {
            content_type: content_type.map(str::to_string),
            content_encoding: content_encoding.map(str::to_string),
        },
        size: content_length.and_then(|len| u64::try_from(len).ok()),
        md5: None,
    }
}

impl S3Api for aws_sdk_s3::Client {
    fn list_buckets(&self) -> LocalBoxFuture<'_, Result<Vec<String>, StorageError>> {
        async move {
            let lb = self
                .list_buckets()
                .send()
                .await
                .map_err(|err| sdk_error(err, "failed to list_buckets".to_string()))?;

            Ok(lb
                .buckets()
                .iter()
                .filter_map(|b| b.name().map(str::to_string))
                .collect())
        }
        .boxed_local()
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            self.put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .set_content_type(metadata.content_type.clone())
                .set_content_encoding(metadata.content_encoding.clone())
                .send()
                .await
                .map_err(|err| sdk_error(err, format!("failed to put_object at: {}", key)))?;

            Ok(())
        }
        .boxed_local()
    }

    fn put_object_from_path<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        source: &'a Path,
        metadata: &'a ObjectMetadata,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            tokio::fs::metadata(source)
                .await
                .map_err(|err| StorageError::from_io(err, &format!("failed to stat {}", source.display())))?;

            let body = ByteStream::from_path(source).await.map_err(|err| {
                StorageError::Unknown(format!("failed to open {}, {}", source.display(), err))
            })?;

            self.put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .set_content_type(metadata.content_type.clone())
                .set_content_encoding(metadata.content_encoding.clone())
                .send()
                .await
                .map_err(|err| sdk_error(err, format!("failed to put_object at: {}", key)))?;

            Ok(())
        }
        .boxed_local()
    }

    fn head_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<ObjectInfo>, StorageError>> {
        async move {
            let ho = match self.head_object().bucket(bucket).key(key).send().await {
                Err(err) => {
                    if let Some(svc_err) = err.as_service_error() {
                        if svc_err.is_not_found() {
                            return Ok(None);
                        }
                    }

                    let err = sdk_error(err, format!("failed to head_object: {}", key));
                    if err.is_not_found() {
                        return Ok(None);
                    }
                    return Err(err);
                }
                Ok(ho) => ho,
            };

            Ok(Some(object_info(
                ho.content_type(),
                ho.content_encoding(),
                ho.content_length(),
            )))
        }
        .boxed_local()
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(ObjectInfo, Vec<u8>), StorageError>> {
        async move {
            let o = self
                .get_object()
                .bucket(bucket)
                .key(key)
                .checksum_mode(ChecksumMode::Enabled)
                .send()
                .await
                .map_err(|err| sdk_error(err, format!("failed to get_object: {}", key)))?;

            let info = object_info(o.content_type(), o.content_encoding(), o.content_length());

            // The body is a single-read stream; it is consumed exactly once here.
            let bytes = o.body.collect().await.map_err(|err| body_error(err, key))?;

            Ok((info, bytes.into_bytes().to_vec()))
        }
        .boxed_local()
    }

    fn get_object_to_path<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        destination: &'a Path,
    ) -> LocalBoxFuture<'a, Result<(ObjectInfo, u64), StorageError>> {
        async move {
            let mut o = self
                .get_object()
                .bucket(bucket)
                .key(key)
                .checksum_mode(ChecksumMode::Enabled)
                .send()
                .await
                .map_err(|err| sdk_error(err, format!("failed to get_object: {}", key)))?;

            let info = object_info(o.content_type(), o.content_encoding(), o.content_length());
            let context = format!("failed to write {}", destination.display());

            let mut file = tokio::fs::File::create(destination)
                .await
                .map_err(|err| StorageError::from_io(err, &context))?;

            let mut written = 0u64;
            while let Some(chunk) = o.body.next().await {
                let chunk = chunk.map_err(|err| body_error(err, key))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|err| StorageError::from_io(err, &context))?;
                written += chunk.len() as u64;
            }

            file.flush()
                .await
                .map_err(|err| StorageError::from_io(err, &context))?;

            Ok((info, written))
        }
        .boxed_local()
    }

    fn copy_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        new_key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            self.copy_object()
                .bucket(bucket)
                .key(new_key)
                .copy_source(format!("{}/{}", bucket, urlencoding::encode(key)))
                .send()
                .await
                .map_err(|err| {
                    sdk_error(err, format!("failed to copy_object: {} to {}", key, new_key))
                })?;

            Ok(())
        }
        .boxed_local()
    }

    fn delete_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            self.delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| sdk_error(err, format!("failed to delete_object: {}", key)))?;

            Ok(())
        }
        .boxed_local()
    }
}
