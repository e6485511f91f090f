use std::io::{Read, Write};

use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};

use crate::model::error::StorageError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map_err(|err| StorageError::Unknown(format!("failed to gzip content: {}", err)))
}

/// A body labelled gzip that does not inflate is reported as corruption.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut out = Vec::new();
    MultiGzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|err| StorageError::Corruption(format!("failed to gunzip content: {}", err)))?;

    Ok(out)
}
