//! Application state for HTTP handlers.

use std::sync::Arc;

use obatch_server::handlers::batch::{AdmissionShutter, BatchHandler, BatchLimits};
use obatch_storage::EntityStore;

/// Application state shared across all HTTP handlers.
///
/// # Type Parameters
///
/// * `S` - The storage backend implementing `EntityStore`
///
/// The admission shutter lives here rather than inside the handler so that
/// every batch served by this process shares one trip state.
pub struct AppState<S: EntityStore + ?Sized> {
    /// The storage backend.
    pub storage: Arc<S>,
    /// The `$batch` handler.
    pub batch_handler: Arc<BatchHandler<S>>,
    /// Process-wide admission shutter.
    pub shutter: Arc<AdmissionShutter>,
}

impl<S: EntityStore + ?Sized> AppState<S> {
    /// Creates a new application state with default batch limits.
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_limits(storage, BatchLimits::default())
    }

    /// Creates a new application state with custom batch limits.
    pub fn with_limits(storage: Arc<S>, limits: BatchLimits) -> Self {
        Self::with_shutter(storage, AdmissionShutter::new_shared(), limits)
    }

    /// Creates a new application state around an existing shutter.
    pub fn with_shutter(
        storage: Arc<S>,
        shutter: Arc<AdmissionShutter>,
        limits: BatchLimits,
    ) -> Self {
        let batch_handler = Arc::new(BatchHandler::new(
            Arc::clone(&storage),
            Arc::clone(&shutter),
            limits,
        ));
        Self {
            storage,
            batch_handler,
            shutter,
        }
    }
}
