use serde::{Deserialize, Serialize};

use crate::model::error::StorageError;

pub const GZIP_ENCODING: &str = "gzip";

/// Stored attributes of an object. Only a `gzip` encoding is interpreted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
}

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_content_encoding(mut self, content_encoding: &str) -> Self {
        self.content_encoding = Some(content_encoding.to_string());
        self
    }

    pub fn is_gzip(&self) -> bool {
        self.content_encoding.as_deref() == Some(GZIP_ENCODING)
    }
}

/// What a backend reports about a stored object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    pub metadata: ObjectMetadata,
    pub size: Option<u64>,
    /// Base64 MD5 of the stored bytes, when the backend publishes one.
    pub md5: Option<String>,
}

/// Content handed to `upload`. Only `Bytes` is accepted by the adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn into_bytes(self) -> Result<Vec<u8>, StorageError> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Text(text) => Err(StorageError::InvalidArgumentType(format!(
                "content must be bytes, got text of {} chars",
                text.chars().count()
            ))),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(bytes: &[u8; N]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidArgument(
            "object key must not be empty".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_rename(key: &str, new_key: &str) -> Result<(), StorageError> {
    validate_key(key)?;
    validate_key(new_key)?;

    if key == new_key {
        return Err(StorageError::InvalidArgument(format!(
            "object key can't be the same as the new object key: {}",
            key
        )));
    }

    Ok(())
}
