//! Process composition.
//!
//! Wires the configured services into lifecycle hooks:
//!
//! ```text
//! <service> hooks (startup_order from config, requires from config)
//!     probe address → register TCP health check with the monitor
//!
//! health_monitor hook (after every service)
//!     optional optimistic bootstrap → HealthMonitor::start
//!     shutdown side: HealthMonitor::stop
//! ```
//!
//! [`run`] drives the whole process: startup, serve until stopped, shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::availability::{AvailabilityGate, ServiceAvailabilityRegistry, ServiceName};
use crate::config::{ControlPlaneConfig, ServiceConfig};
use crate::health::{probe_tcp, tcp_check, HealthMonitor};
use crate::http::{build_router, AppState, HttpServer};
use crate::lifecycle::{
    HookOutcome, HookSpec, LifecycleError, LifecycleRegistry, Shutdown, ShutdownReport,
};

pub const HEALTH_MONITOR_HOOK: &str = "health_monitor";
pub const HEALTH_MONITOR_ORDER: i32 = 900;

/// Shared context handed to every lifecycle hook.
#[derive(Debug)]
pub struct AppContext {
    pub config: ControlPlaneConfig,
    pub availability: Arc<ServiceAvailabilityRegistry>,
    pub monitor: Arc<HealthMonitor>,
}

impl AppContext {
    pub fn new(config: ControlPlaneConfig) -> Self {
        let availability = Arc::new(ServiceAvailabilityRegistry::with_thresholds(
            config.health.failure_threshold,
            config.health.recovery_threshold,
        ));
        let monitor = Arc::new(HealthMonitor::from_config(availability.clone(), &config.health));
        Self { config, availability, monitor }
    }

    pub fn gate(&self) -> AvailabilityGate {
        AvailabilityGate::new(self.availability.clone())
            .with_retry_after(Duration::from_secs(self.config.gate.retry_after_secs))
    }

    /// Services `/health/ready` depends on.
    pub fn readiness_services(&self) -> Vec<ServiceName> {
        if !self.config.gate.readiness_services.is_empty() {
            return self.config.gate.readiness_services.clone();
        }
        self.config
            .services
            .iter()
            .filter(|service| service.required)
            .map(|service| service.name)
            .collect()
    }
}

/// Build the lifecycle registry for the configured services.
pub fn build_lifecycle(
    config: &ControlPlaneConfig,
) -> Result<LifecycleRegistry<AppContext>, LifecycleError> {
    let mut lifecycle = LifecycleRegistry::new();

    for service in &config.services {
        let spec = HookSpec::new(service.name.as_str())
            .order(service.startup_order)
            .requires(service.requires.iter().map(ServiceName::as_str));
        let service = service.clone();
        lifecycle.on_startup(spec, move |ctx: Arc<AppContext>| {
            let service = service.clone();
            async move { Ok(start_service(&ctx, &service).await) }
        })?;
    }

    let monitor_spec = HookSpec::new(HEALTH_MONITOR_HOOK)
        .order(HEALTH_MONITOR_ORDER)
        .requires(config.services.iter().map(|service| service.name.as_str()));
    lifecycle.on_startup(monitor_spec, |ctx: Arc<AppContext>| async move {
        if ctx.config.health.optimistic_boot {
            ctx.availability.mark_available(&optimistic_services(&ctx.availability));
        }
        ctx.monitor.start().await;
        Ok(HookOutcome::Started)
    })?;
    lifecycle.on_shutdown(HookSpec::new(HEALTH_MONITOR_HOOK), |ctx: Arc<AppContext>| async move {
        if ctx.monitor.stop().await {
            Ok(HookOutcome::Started)
        } else {
            Ok(HookOutcome::skipped("health monitor was not running"))
        }
    })?;

    Ok(lifecycle)
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("startup failed: {0}")]
    Startup(#[from] LifecycleError),

    #[error("server failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Start every hook, serve until `stop` resolves, then shut down.
///
/// Shutdown runs whenever startup was attempted, including when startup
/// aborts or a listener fails to bind.
pub async fn run<F>(
    lifecycle: &mut LifecycleRegistry<AppContext>,
    ctx: Arc<AppContext>,
    stop: F,
) -> Result<ShutdownReport, RunError>
where
    F: Future<Output = ()>,
{
    if let Err(e) = lifecycle.startup(ctx.clone()).await {
        tracing::error!(error = %e, "Startup aborted");
        lifecycle.shutdown(ctx).await;
        return Err(e.into());
    }

    let served = serve(&ctx, stop).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "Serving failed, shutting down");
    }

    let report = lifecycle.shutdown(ctx).await;
    if !report.is_clean() {
        tracing::warn!(failed = ?report.failed, "Shutdown completed with failures");
    }
    served?;
    Ok(report)
}

async fn serve<F>(ctx: &AppContext, stop: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let public = TcpListener::bind(&ctx.config.server.bind_address).await?;
    let admin = if ctx.config.admin.enabled {
        Some(TcpListener::bind(&ctx.config.admin.bind_address).await?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new("public", build_router(AppState::from_context(ctx)));
    let mut servers = vec![tokio::spawn(server.run(public, shutdown.subscribe()))];
    if let Some(listener) = admin {
        let server = HttpServer::new("admin", setup_admin_router(AdminState::from_context(ctx)));
        servers.push(tokio::spawn(server.run(listener, shutdown.subscribe())));
    }

    stop.await;
    shutdown.trigger();

    let mut result = Ok(());
    for server in servers {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "HTTP server failed");
                result = Err(e);
            }
            Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
        }
    }
    result
}

/// Probe one service and hand its health check to the monitor.
///
/// The check is registered even when the probe fails so an optional
/// service can recover later.
async fn start_service(ctx: &AppContext, service: &ServiceConfig) -> HookOutcome {
    let timeout = Duration::from_secs(service.connect_timeout_secs);
    let probe = probe_tcp(&service.address, timeout).await;

    ctx.monitor.register_check_fn(
        service.name,
        tcp_check(service.address.clone(), Duration::from_secs(ctx.config.health.timeout_secs)),
    );

    match probe {
        Ok(()) => {
            tracing::info!(service = %service.name, address = %service.address, "Service reachable");
            HookOutcome::Started
        }
        Err(e) if service.required => HookOutcome::fatal(e),
        Err(e) => {
            tracing::warn!(service = %service.name, error = %e, "Optional service unreachable");
            ctx.availability.update_health(service.name, false, Some(e.to_string()));
            HookOutcome::degraded(e)
        }
    }
}

/// Services with no recorded failure. A degraded startup probe counts.
fn optimistic_services(availability: &ServiceAvailabilityRegistry) -> Vec<ServiceName> {
    availability
        .snapshot()
        .into_iter()
        .filter(|status| status.consecutive_failures == 0)
        .map(|status| status.service)
        .collect()
}
