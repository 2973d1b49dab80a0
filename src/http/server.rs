//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with mediation and admin handlers
//! - Wire up middleware (tracing)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::dispatch::Dispatcher;
use crate::http::mediate::mediate_handler;

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// HTTP server exposing the endpoint tree.
pub struct MediatorServer {
    router: Router,
}

impl MediatorServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let state = AppState { dispatcher };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/mediate/{endpoint}", any(mediate_handler))
            .route("/mediate/{endpoint}/{*rest}", any(mediate_handler))
            .with_state(state.clone())
            .merge(setup_admin_router(state))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
