pub mod checks;
pub mod fs;
pub mod inventory;
pub mod logs;
pub mod process;
pub mod system;

use std::time::Duration;
use thiserror::Error;
use tokio::{task, time};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("blocking task failed: {0}")]
    Join(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Runs blocking I/O off the runtime, bounded by `limit`.
///
/// On timeout the closure keeps running on the blocking pool until it
/// returns; its result is dropped and any handles it opened are closed then.
pub async fn run_blocking<T, F>(limit: Duration, f: F) -> Result<T, ProbeError>
where
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
    T: Send + 'static,
{
    match time::timeout(limit, task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ProbeError::Join(join.to_string())),
        Err(_elapsed) => Err(ProbeError::Timeout(limit)),
    }
}
