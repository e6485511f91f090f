use base64::{engine::general_purpose::STANDARD, Engine};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::model::error::StorageError;

/// One-way, stable file name for an object key.
pub fn key_file_name(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Checks `bytes` against a base64 MD5 as reported in object metadata.
pub fn verify_md5(key: &str, bytes: &[u8], expected_b64: &str) -> Result<(), StorageError> {
    let actual = STANDARD.encode(Md5::digest(bytes));
    if actual != expected_b64 {
        return Err(StorageError::Corruption(format!(
            "md5 mismatch for {}: expected {}, got {}",
            key, expected_b64, actual
        )));
    }

    Ok(())
}
