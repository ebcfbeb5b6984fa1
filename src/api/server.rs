//! Inference server lifecycle: starts/stops the axum HTTP server.
//!
//! Bind → spawn background task → return handle with shutdown channel.
//! The registry must already be loaded; the listener is never bound for a
//! process that cannot serve every task.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::router::inference_router;
use crate::dispatch::Dispatcher;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Session metadata for a running inference server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running inference server.
pub struct InferenceServer {
    pub session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl InferenceServer {
    /// Shut down the server gracefully. In-flight requests complete.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Inference server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish (after `shutdown`, or on error).
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Inference server task panicked: {e}");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Start the inference server on `addr` (port 0 picks an ephemeral port).
pub async fn start_server(
    dispatcher: Arc<Dispatcher>,
    addr: SocketAddr,
    max_upload_bytes: usize,
) -> Result<InferenceServer, String> {
    // 1. Bind
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind inference server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    // 2. Build the router
    let app = inference_router(dispatcher, max_upload_bytes);

    // 3. Session metadata
    let session = ServerSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    // 4. Shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // 5. Serve in background task
    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Inference server received shutdown signal");
        };

        tracing::info!(%addr, "Inference server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Inference server error: {e}");
        }

        tracing::info!("Inference server stopped");
    });

    Ok(InferenceServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
