use std::io;

use thiserror::Error;

/// Normalized failure kinds every adapter maps its native errors onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedBackend,
    InvalidRequest,
    InvalidArgument,
    InvalidArgumentType,
    NotFound,
    ServerError,
    Corruption,
    RenameIncomplete,
    Unknown,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid argument type: {0}")]
    InvalidArgumentType(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("corruption: {0}")]
    Corruption(String),

    /// The new key became visible but the old key could not be removed.
    /// Presence flags come from probing both keys after the failure.
    #[error(
        "rename of {from} to {to} incomplete (source present: {source_present:?}, destination present: {destination_present:?}): {cause}"
    )]
    RenameIncomplete {
        from: String,
        to: String,
        source_present: Option<bool>,
        destination_present: Option<bool>,
        cause: Box<StorageError>,
    },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::UnsupportedBackend(_) => ErrorKind::UnsupportedBackend,
            StorageError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            StorageError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StorageError::InvalidArgumentType(_) => ErrorKind::InvalidArgumentType,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::ServerError(_) => ErrorKind::ServerError,
            StorageError::Corruption(_) => ErrorKind::Corruption,
            StorageError::RenameIncomplete { .. } => ErrorKind::RenameIncomplete,
            StorageError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Maps an HTTP status reported by a backend onto the taxonomy.
    /// Failures without a status (dispatch, timeouts, body streams) are unknown.
    pub fn from_status(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            Some(400) => StorageError::InvalidRequest(message),
            Some(404) => StorageError::NotFound(message),
            Some(code) if (500..600).contains(&code) => StorageError::ServerError(message),
            _ => StorageError::Unknown(message),
        }
    }

    pub fn from_io(err: io::Error, context: &str) -> Self {
        let message = format!("{}: {}", context, err);
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(message),
            _ => StorageError::Unknown(message),
        }
    }
}
