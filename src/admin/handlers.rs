use std::time::UNIX_EPOCH;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::availability::{OverrideMode, ServiceName, ServiceStatus};
use crate::health::{CheckResult, MonitorState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub monitor: MonitorState,
    pub available: usize,
    pub unavailable: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceView {
    pub service: ServiceName,
    pub available: bool,
    pub health_available: bool,
    pub override_mode: OverrideMode,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_check_unix_secs: Option<u64>,
    pub last_error: Option<String>,
    pub monitored: bool,
}

impl ServiceView {
    fn from_status(status: ServiceStatus, monitored: bool) -> Self {
        Self {
            service: status.service,
            available: status.is_available(),
            health_available: status.health_available,
            override_mode: status.override_mode,
            consecutive_failures: status.consecutive_failures,
            consecutive_successes: status.consecutive_successes,
            last_check_unix_secs: status
                .last_check
                .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
            last_error: status.last_error,
            monitored,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub mode: OverrideMode,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let available = ServiceName::ALL
        .iter()
        .filter(|service| state.registry.is_available(**service))
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        monitor: state.monitor.state(),
        available,
        unavailable: ServiceName::COUNT - available,
    })
}

pub async fn get_services(State(state): State<AdminState>) -> Json<Vec<ServiceView>> {
    let monitored = state.monitor.registered_services();
    let views = state
        .registry
        .snapshot()
        .into_iter()
        .map(|status| {
            let is_monitored = monitored.contains(&status.service);
            ServiceView::from_status(status, is_monitored)
        })
        .collect();
    Json(views)
}

pub async fn put_override(
    State(state): State<AdminState>,
    Path(service): Path<ServiceName>,
    Json(request): Json<OverrideRequest>,
) -> Json<ServiceView> {
    if state.registry.set_override(service, request.mode) {
        tracing::info!(service = %service, mode = %request.mode, "Override applied via admin API");
    }
    let monitored = state.monitor.registered_services().contains(&service);
    Json(ServiceView::from_status(state.registry.status(service), monitored))
}

pub async fn post_check(State(state): State<AdminState>) -> Json<Vec<CheckResult>> {
    Json(state.monitor.trigger_check().await)
}
