//! Shared types for the inference API layer.

use std::sync::Arc;

use tracing::Span;

use crate::api::error::ApiError;
use crate::dispatch::Dispatcher;
use crate::error::InferenceError;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub dispatcher: Arc<Dispatcher>,
    /// Request body limit for image uploads.
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(dispatcher: Arc<Dispatcher>, max_upload_bytes: usize) -> Self {
        Self {
            dispatcher,
            max_upload_bytes,
        }
    }

    /// Run synchronous inference work off the async executor.
    ///
    /// Preprocessing and model invocation are CPU-bound, so they go to the
    /// blocking pool. The caller's span is carried over so dispatch logs
    /// stay attached to the request.
    pub async fn run<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Dispatcher) -> Result<T, InferenceError> + Send + 'static,
    {
        let dispatcher = Arc::clone(&self.dispatcher);
        let span = Span::current();
        let result = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            work(&dispatcher)
        })
        .await??;
        Ok(result)
    }
}
