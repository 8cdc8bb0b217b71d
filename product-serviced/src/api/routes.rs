use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::protocol::{HEALTH_CHECK_PATH, HOME_PAGE_PATH, STATUS_PAGE_PATH};
use tokio::sync::watch;
use crate::registry::LifecycleState;

/// Static facts about this instance, captured once at boot
#[derive(Debug, Clone)]
pub struct InstanceSummary {
    pub app: String,
    pub instance_id: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub instance: Arc<InstanceSummary>,
    pub lifecycle_rx: watch::Receiver<LifecycleState>,
}

#[derive(Serialize)]
pub struct HomeResponse {
    pub app: String,
    pub instance_id: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub app: String,
    pub instance_id: String,
    pub port: u16,
    pub state: LifecycleState,
    pub started_at: DateTime<Utc>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HOME_PAGE_PATH, get(get_home))
        .route(HEALTH_CHECK_PATH, get(get_health))
        .route(STATUS_PAGE_PATH, get(get_info))
        .with_state(state)
}

async fn get_home(State(state): State<AppState>) -> Json<HomeResponse> {
    Json(HomeResponse {
        app: state.instance.app.clone(),
        instance_id: state.instance.instance_id.clone(),
    })
}

/// 200 only while the instance is UP in the registry
async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let lifecycle = *state.lifecycle_rx.borrow();
    let (code, status) = match lifecycle {
        LifecycleState::Up => (StatusCode::OK, "UP"),
        LifecycleState::Unregistered | LifecycleState::Starting => {
            (StatusCode::SERVICE_UNAVAILABLE, "STARTING")
        }
        LifecycleState::Down | LifecycleState::Deregistered => {
            (StatusCode::SERVICE_UNAVAILABLE, "DOWN")
        }
    };
    (code, Json(HealthResponse { status }))
}

async fn get_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        app: state.instance.app.clone(),
        instance_id: state.instance.instance_id.clone(),
        port: state.instance.port,
        state: *state.lifecycle_rx.borrow(),
        started_at: state.instance.started_at,
    })
}
