//! One blocking storage interface over the local filesystem, Google Cloud
//! Storage and Amazon S3.

pub mod adapters;
pub mod client;
pub mod config;
pub mod model;
pub mod util;

pub use adapters::{gcs::GcsStorage, local::LocalStorage, s3::S3Storage, ObjectStorage};
pub use client::{create_storage_client, create_storage_client_by_name};
pub use config::StorageConfig;
pub use model::{
    error::{ErrorKind, StorageError},
    object::{ObjectMetadata, Payload},
};
pub use util::object::Backend;
