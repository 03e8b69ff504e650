// rest/routes.rs — REST route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::install::{management_endpoint, InstallRequest};
use crate::observability::HealthStatus;
use crate::topology::model::{EntityKind, EventRecord, TopologyGraph};
use crate::AppContext;

// ─── GET /api/v1/health ───────────────────────────────────────────────────────

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthStatus> {
    let entities = ctx.topology.lock().await.store().len();
    Json(HealthStatus::ok(
        ctx.started_at.elapsed().as_secs(),
        ctx.transport.connected(),
        entities,
    ))
}

// ─── GET /api/v1/topology ─────────────────────────────────────────────────────

/// The full current graph, for clients that sync from scratch.
pub async fn topology_get(State(ctx): State<Arc<AppContext>>) -> Json<TopologyGraph> {
    Json(ctx.topology.lock().await.graph())
}

// ─── DELETE /api/v1/topology ──────────────────────────────────────────────────

/// Administrative reset: clear the remote snapshot store, then the local
/// model. If the remote side fails the local model is left untouched, so the
/// two never diverge silently.
pub async fn topology_reset(State(ctx): State<Arc<AppContext>>) -> Response {
    if let Err(e) = ctx.state.delete_all().await {
        warn!("remote state reset failed: {e:#}");
        return error_response(StatusCode::BAD_GATEWAY, &format!("{e:#}"));
    }

    let diff = ctx.topology.lock().await.reset();
    if !diff.is_empty() {
        ctx.broadcaster.broadcast_diff(&diff);
    }
    StatusCode::NO_CONTENT.into_response()
}

// ─── POST /api/v1/runtimes/{id}/modules ───────────────────────────────────────

/// Forward a module install request to the runtime's management endpoint.
/// The model does not change here — it updates when the runtime announces
/// the `module-inst` event over the broker.
pub async fn install_module(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(request): Json<InstallRequest>,
) -> Response {
    let (address, port) = match runtime_endpoint(&ctx, &id).await {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };

    match ctx.installer.install(&address, port, &request).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "requested" }))).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &format!("{e:#}")),
    }
}

// ─── DELETE /api/v1/runtimes/{id}/modules/{name} ──────────────────────────────

pub async fn uninstall_module(
    State(ctx): State<Arc<AppContext>>,
    Path((id, name)): Path<(String, String)>,
) -> Response {
    let (address, port) = match runtime_endpoint(&ctx, &id).await {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };

    match ctx.installer.uninstall(&address, port, &name).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "requested" }))).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &format!("{e:#}")),
    }
}

// ─── POST /api/v1/runtimes/{id}/stop ──────────────────────────────────────────

/// Publish a remove-runtime command on the runtime's channel. The model
/// updates when the resulting `rt-stop` lifecycle event is delivered back.
pub async fn stop_runtime(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Response {
    match ctx.topology.lock().await.store().get(&id) {
        Some(entity) if entity.kind == EntityKind::Runtime => {}
        Some(_) => return error_response(StatusCode::BAD_REQUEST, "entity is not a runtime"),
        None => return error_response(StatusCode::NOT_FOUND, "unknown runtime"),
    }

    let channel = ctx.config.runtime_channel(&id);
    match ctx
        .transport
        .publish(&channel, &EventRecord::runtime_stop(&id))
        .await
    {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "requested" }))).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &format!("{e:#}")),
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Look up a Runtime entity and resolve its management address/port.
async fn runtime_endpoint(ctx: &Arc<AppContext>, id: &str) -> Result<(String, u16), Response> {
    let topology = ctx.topology.lock().await;
    match topology.store().get(id) {
        Some(entity) if entity.kind == EntityKind::Runtime => management_endpoint(entity)
            .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, &format!("{e:#}"))),
        Some(_) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "entity is not a runtime",
        )),
        None => Err(error_response(StatusCode::NOT_FOUND, "unknown runtime")),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
