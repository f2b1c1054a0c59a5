//! Operator-facing HTTP surface: health, Prometheus metrics, node status,
//! approval lookup, and dead-letter queue inspection. None of this is on
//! the consensus hot path; it exists for humans and monitoring, not peers.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use hyperraft_consensus::ConsensusHandle;
use hyperraft_storage::{ApprovalView, DeliveryStore};
use hyperraft_types::Approval;
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;

pub struct AdminState<V: ApprovalView, D: DeliveryStore> {
    pub consensus: ConsensusHandle,
    pub approvals: Arc<V>,
    pub deliveries: Arc<D>,
    pub registry: Registry,
    pub delivery_partitions: u32,
}

pub fn router<V, D>(state: Arc<AdminState<V, D>>) -> Router
where
    V: ApprovalView + 'static,
    D: DeliveryStore + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::<V, D>))
        .route("/status", get(status::<V, D>))
        .route("/approvals/:approval_id", get(get_approval::<V, D>))
        .route("/delivery/:partition/depth", get(delivery_depth::<V, D>))
        .route(
            "/delivery/:partition/dead-letter",
            get(dead_letter::<V, D>),
        )
        .layer(Extension(state))
}

pub async fn serve<V, D>(
    address: SocketAddr,
    state: Arc<AdminState<V, D>>,
) -> std::io::Result<()>
where
    V: ApprovalView + 'static,
    D: DeliveryStore + 'static,
{
    tracing::info!(%address, "admin interface listening");
    axum::Server::bind(&address)
        .serve(router(state).into_make_service())
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics<V: ApprovalView, D: DeliveryStore>(
    Extension(state): Extension<Arc<AdminState<V, D>>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = state.registry.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics".to_string());
    }
    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

async fn status<V: ApprovalView, D: DeliveryStore>(
    Extension(state): Extension<Arc<AdminState<V, D>>>,
) -> impl IntoResponse {
    match state.consensus.status().await {
        Ok(status) => {
            let body = serde_json::json!({
                "self_id": status.self_id.0,
                "role": format!("{:?}", status.role),
                "current_term": status.current_term.0,
                "commit_index": status.commit_index.0,
                "current_leader": status.current_leader.map(|n| n.0),
            });
            (StatusCode::OK, Json(body))
        }
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": err.to_string() })),
        ),
    }
}

async fn get_approval<V: ApprovalView, D: DeliveryStore>(
    Extension(state): Extension<Arc<AdminState<V, D>>>,
    Path(approval_id): Path<String>,
) -> impl IntoResponse {
    match state.approvals.get(&approval_id).await {
        Ok(Some(approval)) => (StatusCode::OK, Json(Some(approval))),
        Ok(None) => (StatusCode::NOT_FOUND, Json(None::<Approval>)),
        Err(err) => {
            tracing::warn!(%err, %approval_id, "approval lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(None::<Approval>))
        }
    }
}

async fn delivery_depth<V: ApprovalView, D: DeliveryStore>(
    Extension(state): Extension<Arc<AdminState<V, D>>>,
    Path(partition): Path<u32>,
) -> impl IntoResponse {
    if partition >= state.delivery_partitions {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({})));
    }
    match state.deliveries.depth(partition).await {
        Ok(depth) => (StatusCode::OK, Json(serde_json::json!({ "depth": depth }))),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": err.to_string() })),
        ),
    }
}

async fn dead_letter<V: ApprovalView, D: DeliveryStore>(
    Extension(state): Extension<Arc<AdminState<V, D>>>,
    Path(partition): Path<u32>,
) -> impl IntoResponse {
    match state.deliveries.list_dead_lettered(partition).await {
        Ok(deliveries) => (StatusCode::OK, Json(deliveries)),
        Err(err) => {
            tracing::warn!(%err, partition, "dead-letter listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::new()))
        }
    }
}
