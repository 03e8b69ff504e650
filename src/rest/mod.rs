// rest/mod.rs — Public REST API server.
//
// Axum HTTP server bridging the topology model to rendering clients. CORS is
// permissive — the graph viewer is served from its own origin.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/topology
//   DELETE /api/v1/topology
//   GET    /api/v1/events                          (SSE)
//   POST   /api/v1/runtimes/{id}/modules
//   DELETE /api/v1/runtimes/{id}/modules/{name}
//   POST   /api/v1/runtimes/{id}/stop

pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health))
        .route(
            "/api/v1/topology",
            get(routes::topology_get).delete(routes::topology_reset),
        )
        .route("/api/v1/events", get(sse::topology_events_sse))
        .route(
            "/api/v1/runtimes/{id}/modules",
            post(routes::install_module),
        )
        .route(
            "/api/v1/runtimes/{id}/modules/{name}",
            axum::routing::delete(routes::uninstall_module),
        )
        .route("/api/v1/runtimes/{id}/stop", post(routes::stop_runtime))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
