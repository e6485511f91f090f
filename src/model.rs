pub mod error;
pub mod gcs;
pub mod object;
pub mod s3;
