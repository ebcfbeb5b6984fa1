//! HTTP boundary for the inference core.
//!
//! Translates wire requests into typed `TaskRequest`s, runs them through
//! the `Dispatcher` on the blocking pool, and maps results and errors back
//! to JSON. The router is composable: `inference_router()` returns a
//! `Router` that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::inference_router;
pub use server::{start_server, InferenceServer, ServerSession};
pub use types::ApiContext;
