//! Blocking work off the async executor.
//!
//! Inference, Argon2 and SQLite calls are synchronous; handlers hand them to
//! Tokio's blocking pool so the request loop stays responsive.

use crate::GlimpseError;

/// Run `job` on the blocking pool and flatten its result.
///
/// # Errors
/// Returns the job's own error, or `Worker` if the task panicked or was
/// cancelled.
pub async fn run_blocking<T, F>(job: F) -> Result<T, GlimpseError>
where
    F: FnOnce() -> Result<T, GlimpseError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|e| {
        tracing::error!("Blocking task failed: {e}");
        GlimpseError::Worker(e.to_string())
    })?
}
