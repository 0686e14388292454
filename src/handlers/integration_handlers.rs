use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;

use crate::auth_middleware::AdminUser;
use crate::error::AppResult;
use crate::queue::QueueStats;
use crate::util::now_unix;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub detail: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub storage: ComponentHealth,
    pub queue_backend: ComponentHealth,
    pub bridge: ComponentHealth,
    pub queue: ComponentHealth,
}

/// Four-component probe (§4.9): storage, the queue's Redis backend, the
/// bridge, and queue depth. Overall status is healthy iff every component
/// is healthy, unhealthy iff any component is unhealthy, else degraded.
pub async fn health(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<HealthResponse>> {
    let storage = check_storage(&state);
    let queue_backend = check_queue_backend(&state).await;
    let bridge = check_bridge(&state).await;
    let queue = check_queue_depth(&state).await;

    let components = [&storage, &queue_backend, &bridge, &queue];
    let status = if components.iter().any(|c| c.status == ComponentStatus::Unhealthy) {
        ComponentStatus::Unhealthy
    } else if components.iter().any(|c| c.status == ComponentStatus::Degraded) {
        ComponentStatus::Degraded
    } else {
        ComponentStatus::Healthy
    };

    Ok(Json(HealthResponse { status, storage, queue_backend, bridge, queue }))
}

fn check_storage(state: &AppState) -> ComponentHealth {
    match state.pool.get() {
        Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn) {
            Ok(_) => ComponentHealth { status: ComponentStatus::Healthy, detail: "ok".to_string() },
            Err(e) => ComponentHealth { status: ComponentStatus::Unhealthy, detail: e.to_string() },
        },
        Err(e) => ComponentHealth { status: ComponentStatus::Unhealthy, detail: e.to_string() },
    }
}

async fn check_queue_backend(state: &AppState) -> ComponentHealth {
    match state.outbound.ping().await {
        Ok(_) => {
            let memory = state.outbound.memory_summary().await.unwrap_or_else(|_| "unknown".to_string());
            ComponentHealth { status: ComponentStatus::Healthy, detail: format!("used_memory={memory}") }
        }
        Err(e) => ComponentHealth { status: ComponentStatus::Unhealthy, detail: e.to_string() },
    }
}

async fn check_bridge(state: &AppState) -> ComponentHealth {
    match state.bridge.health().await {
        Ok(_) => match state.bridge.list_sessions().await {
            Ok(sessions) if sessions.is_empty() => {
                ComponentHealth { status: ComponentStatus::Degraded, detail: "connected, no sessions".to_string() }
            }
            Ok(sessions) => ComponentHealth { status: ComponentStatus::Healthy, detail: format!("{} session(s)", sessions.len()) },
            Err(e) => ComponentHealth { status: ComponentStatus::Degraded, detail: e.to_string() },
        },
        Err(e) => ComponentHealth { status: ComponentStatus::Unhealthy, detail: e.to_string() },
    }
}

async fn check_queue_depth(state: &AppState) -> ComponentHealth {
    match state.outbound.stats().await {
        Ok(stats) => {
            let depth = stats.queued + stats.processing;
            let status = if depth < 100 {
                ComponentStatus::Healthy
            } else if depth < 500 {
                ComponentStatus::Degraded
            } else {
                ComponentStatus::Unhealthy
            };
            ComponentHealth { status, detail: format!("depth={depth} dead={}", stats.dead) }
        }
        Err(e) => ComponentHealth { status: ComponentStatus::Unhealthy, detail: e.to_string() },
    }
}

#[derive(Serialize)]
pub struct ReinitializeResponse {
    pub webhook_configured: bool,
}

/// Re-pushes C8's webhook URL to the bridge; used after the bridge has been
/// restarted or its session wiped and needs to be told where to call back.
pub async fn reinitialize(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<ReinitializeResponse>> {
    state.bridge.configure_webhook(&state.config.webhook_base_url, state.config.webhook_secret.as_deref()).await?;
    state.bridge.create_session(crate::supervisor::BRIDGE_SESSION_ID).await?;
    Ok(Json(ReinitializeResponse { webhook_configured: true }))
}

pub async fn queue_stats(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<QueueStats>> {
    Ok(Json(state.outbound.stats().await?))
}

#[derive(Serialize)]
pub struct ClearFailedResponse {
    pub cleared: u64,
}

pub async fn queue_clear_failed(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<ClearFailedResponse>> {
    let cleared = state.outbound.clear_dead().await?;
    Ok(Json(ClearFailedResponse { cleared }))
}

#[derive(Serialize)]
pub struct RequeueFailedResponse {
    pub requeued: u64,
}

pub async fn queue_requeue_failed(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<RequeueFailedResponse>> {
    let requeued = state.outbound.requeue_dead(now_unix()).await?;
    Ok(Json(RequeueFailedResponse { requeued }))
}
