use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::model::error::StorageError;

/// Builds the runtime an adapter drives its native client with.
pub fn new_runtime() -> Result<Runtime, StorageError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| StorageError::Unknown(format!("failed to build runtime: {}", err)))
}

/// Blocks the calling thread until `future` resolves.
///
/// Adapters are blocking by contract, so this must not be reached from a
/// thread that is already driving a tokio runtime.
pub fn poll_until_ready_error<Fut, T>(runtime: &Runtime, future: Fut) -> Result<T, StorageError>
where
    Fut: Future<Output = Result<T, StorageError>>,
{
    if Handle::try_current().is_ok() {
        return Err(StorageError::Unknown(
            "blocking storage call made from within an async runtime".to_string(),
        ));
    }

    runtime.block_on(future)
}
