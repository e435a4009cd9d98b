//! Operator API: inspect availability, set overrides, trigger checks.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::app::AppContext;
use crate::availability::ServiceAvailabilityRegistry;
use crate::health::HealthMonitor;
use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<ServiceAvailabilityRegistry>,
    pub monitor: Arc<HealthMonitor>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn from_context(ctx: &AppContext) -> Self {
        Self {
            registry: ctx.availability.clone(),
            monitor: ctx.monitor.clone(),
            api_key: Arc::from(ctx.config.admin.api_key.as_str()),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(get_services))
        .route("/admin/services/{service}/override", put(put_override))
        .route("/admin/health/check", post(post_check))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
