//! Worker runtime for non-blocking native calls
//!
//! Non-blocking calls run on tokio's blocking pool so the caller only waits
//! when it asks for the result. One runtime serves the whole process; it is
//! built lazily on first use, or sized explicitly with [`init_runtime`].

use crate::ffi::error::BoundaryError;
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

/// Global tokio runtime for native calls
static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Default cap on concurrently running non-blocking calls
pub const DEFAULT_BLOCKING_THREADS: usize = 512;

fn build_runtime(max_blocking_threads: usize) -> Result<Runtime, BoundaryError> {
    Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(max_blocking_threads.max(1))
        .thread_name("isthmus-native")
        .build()
        .map_err(|e| BoundaryError::Runtime(e.to_string()))
}

/// Initialize the global runtime with a blocking-pool size
///
/// Has no effect if the runtime already exists.
pub fn init_runtime(max_blocking_threads: usize) -> Result<&'static Runtime, BoundaryError> {
    if let Some(runtime) = TOKIO_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = build_runtime(max_blocking_threads)?;
    if TOKIO_RUNTIME.set(runtime).is_ok() {
        debug!(max_blocking_threads, "native worker runtime started");
    }
    TOKIO_RUNTIME
        .get()
        .ok_or_else(|| BoundaryError::Runtime("runtime not initialized".to_string()))
}

/// Get a reference to the global runtime, building it on first use
pub fn runtime() -> Result<&'static Runtime, BoundaryError> {
    init_runtime(DEFAULT_BLOCKING_THREADS)
}

/// Block the current thread until `future` completes
///
/// Refuses to run from inside an async context, where blocking would stall
/// the executor that is supposed to drive the future.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, BoundaryError> {
    if Handle::try_current().is_ok() {
        return Err(BoundaryError::Runtime(
            "cannot block inside an async context; await the result instead".to_string(),
        ));
    }
    Ok(runtime()?.block_on(future))
}
