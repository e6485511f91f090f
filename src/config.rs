use std::{env, path::PathBuf};

pub const LOCAL_STORAGE_ROOT: &str = "/tmp/local_storage";

/// Recognized options for the S3 client. Credentials always come from the
/// default `aws-config` provider chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct S3Config {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// Recognized options for the Cloud Storage client. Credentials come from
/// application default credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcsConfig {
    pub project_id: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub local_root: PathBuf,
    pub s3: S3Config,
    pub gcs: GcsConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_root: PathBuf::from(LOCAL_STORAGE_ROOT),
            s3: S3Config::default(),
            gcs: GcsConfig::default(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Self {
            local_root: non_empty("CLOUD_STORAGE_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(LOCAL_STORAGE_ROOT)),
            s3: S3Config {
                region: non_empty("CLOUD_STORAGE_S3_REGION"),
                endpoint_url: non_empty("CLOUD_STORAGE_S3_ENDPOINT"),
                force_path_style: non_empty("CLOUD_STORAGE_S3_FORCE_PATH_STYLE")
                    .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
            gcs: GcsConfig {
                project_id: non_empty("CLOUD_STORAGE_GCS_PROJECT"),
                endpoint: non_empty("CLOUD_STORAGE_GCS_ENDPOINT"),
            },
        }
    }
}
