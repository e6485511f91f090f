use std::{fmt, str::FromStr};

use crate::model::error::StorageError;

/// Closed set of backends a client can be created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Gcs,
    Local,
    S3,
}

impl Backend {
    pub fn token(&self) -> &'static str {
        match self {
            Backend::Gcs => "gcs",
            Backend::Local => "local",
            Backend::S3 => "s3",
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            Backend::Gcs => "gs",
            Backend::Local => "local",
            Backend::S3 => "s3",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Backend {
    type Err = StorageError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "gcs" => Ok(Backend::Gcs),
            "local" => Ok(Backend::Local),
            "s3" => Ok(Backend::S3),
            _ => Err(StorageError::UnsupportedBackend(format!(
                "{} is not supported",
                token
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectUri {
    pub backend: Backend,
    pub bucket: String,
    pub key: String,
}

pub fn parse_backend_from_uri(uri: &str) -> Result<Backend, StorageError> {
    let scheme = uri.split_once("://").map(|(scheme, _)| scheme).unwrap_or("");
    [Backend::Gcs, Backend::Local, Backend::S3]
        .into_iter()
        .find(|backend| backend.scheme() == scheme)
        .ok_or_else(|| StorageError::UnsupportedBackend(format!("failed to parse backend of: {}", uri)))
}

/// Splits `gs://bucket/a/b.txt` into backend, bucket and key. The key may be
/// empty for bucket-level commands.
pub fn parse_object_uri(uri: &str) -> Result<ObjectUri, StorageError> {
    let backend = parse_backend_from_uri(uri)?;
    let rest = uri.split_once("://").map(|(_, rest)| rest).unwrap_or("");
    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));

    if bucket.is_empty() {
        return Err(StorageError::InvalidArgument(format!(
            "missing bucket in: {}",
            uri
        )));
    }

    Ok(ObjectUri {
        backend,
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}
