//! Background health monitor.
//!
//! # Responsibilities
//! - Hold one registered check per service
//! - Run all checks concurrently, each bounded by a timeout
//! - Feed results into the availability registry
//! - Repeat on a fixed interval until stopped

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::availability::{ServiceAvailabilityRegistry, ServiceName};
use crate::config::HealthConfig;
use crate::health::check::{boxed, CheckOutput, CheckResult, HealthCheckFn};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::metrics;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Stopped,
    Running,
}

struct Inner {
    registry: Arc<ServiceAvailabilityRegistry>,
    checks: RwLock<BTreeMap<ServiceName, HealthCheckFn>>,
    check_interval: Duration,
    check_timeout: Duration,
    running: AtomicBool,
    /// Held for the duration of a cycle so cycles never overlap.
    cycle: Mutex<()>,
}

struct RunningLoop {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

/// Polls registered health checks and updates the availability registry.
pub struct HealthMonitor {
    inner: Arc<Inner>,
    stop_grace: Duration,
    task: Mutex<Option<RunningLoop>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServiceAvailabilityRegistry>,
        check_interval: Duration,
        check_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                checks: RwLock::new(BTreeMap::new()),
                check_interval,
                check_timeout,
                running: AtomicBool::new(false),
                cycle: Mutex::new(()),
            }),
            stop_grace: DEFAULT_STOP_GRACE,
            task: Mutex::new(None),
        }
    }

    pub fn from_config(registry: Arc<ServiceAvailabilityRegistry>, config: &HealthConfig) -> Self {
        Self::new(
            registry,
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.timeout_secs),
        )
        .with_stop_grace(Duration::from_secs(config.stop_grace_secs))
    }

    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    pub fn registry(&self) -> &Arc<ServiceAvailabilityRegistry> {
        &self.inner.registry
    }

    /// Register the check for `service`, replacing any previous one.
    pub fn register_health_check<F, Fut>(&self, service: ServiceName, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckOutput> + Send + 'static,
    {
        self.register_check_fn(service, boxed(check));
    }

    pub fn register_check_fn(&self, service: ServiceName, check: HealthCheckFn) {
        let mut checks = self.inner.checks.write().unwrap_or_else(PoisonError::into_inner);
        if checks.insert(service, check).is_some() {
            tracing::warn!(service = %service, "Replaced existing health check");
        } else {
            tracing::debug!(service = %service, "Registered health check");
        }
    }

    pub fn registered_services(&self) -> Vec<ServiceName> {
        let checks = self.inner.checks.read().unwrap_or_else(PoisonError::into_inner);
        checks.keys().copied().collect()
    }

    pub fn state(&self) -> MonitorState {
        if self.is_running() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Run every registered check once and record the results.
    pub async fn run_cycle(&self) -> Vec<CheckResult> {
        self.inner.run_cycle().await
    }

    /// Run a cycle now, outside the loop's cadence.
    pub async fn trigger_check(&self) -> Vec<CheckResult> {
        tracing::info!("Manual health check triggered");
        self.inner.run_cycle().await
    }

    /// Run one cycle, then start the background loop. No-op when running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            tracing::debug!("Health monitor already running");
            return;
        }

        tracing::info!(
            interval_secs = self.inner.check_interval.as_secs_f64(),
            timeout_secs = self.inner.check_timeout.as_secs_f64(),
            checks = self.registered_services().len(),
            "Health monitor starting"
        );
        self.inner.run_cycle().await;

        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_loop(self.inner.clone(), shutdown.subscribe()));
        self.inner.running.store(true, Ordering::Release);
        *task = Some(RunningLoop { shutdown, handle });
    }

    /// Stop the background loop. Returns false when it was not running.
    pub async fn stop(&self) -> bool {
        let Some(RunningLoop { shutdown, mut handle }) = self.task.lock().await.take() else {
            return false;
        };

        shutdown.trigger();
        match tokio::time::timeout(self.stop_grace, &mut handle).await {
            Ok(Ok(())) => tracing::info!("Health monitor stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Health monitor task ended abnormally"),
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.stop_grace.as_secs_f64(),
                    "Health monitor did not stop in time, aborting"
                );
                handle.abort();
            }
        }
        self.inner.running.store(false, Ordering::Release);
        true
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(running) = self.task.get_mut().take() {
            running.handle.abort();
        }
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("state", &self.state())
            .field("check_interval", &self.inner.check_interval)
            .field("check_timeout", &self.inner.check_timeout)
            .field("stop_grace", &self.stop_grace)
            .field("services", &self.registered_services())
            .finish()
    }
}

impl Inner {
    async fn run_cycle(&self) -> Vec<CheckResult> {
        let _cycle = self.cycle.lock().await;

        let checks: Vec<(ServiceName, HealthCheckFn)> = {
            let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
            checks.iter().map(|(service, check)| (*service, check.clone())).collect()
        };
        if checks.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        let services: Vec<ServiceName> = checks.iter().map(|(service, _)| *service).collect();
        let handles = checks
            .into_iter()
            .map(|(service, check)| tokio::spawn(run_check(service, check, self.check_timeout)));
        let joined = join_all(handles).await;

        let mut results = Vec::with_capacity(joined.len());
        for (service, outcome) in services.into_iter().zip(joined) {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => CheckResult::unhealthy(
                    service,
                    format!("health check panicked: {e}"),
                    Duration::ZERO,
                ),
            };

            metrics::record_health_check(
                service.as_str(),
                result.healthy,
                Duration::from_millis(result.duration_ms),
            );
            if !result.healthy {
                tracing::debug!(
                    service = %service,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Health check failed"
                );
            }
            self.registry.update_health(service, result.healthy, result.error.clone());
            results.push(result);
        }

        tracing::debug!(
            checks = results.len(),
            unhealthy = results.iter().filter(|r| !r.healthy).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Health check cycle complete"
        );
        results
    }
}

async fn run_check(service: ServiceName, check: HealthCheckFn, timeout: Duration) -> CheckResult {
    let started = Instant::now();
    match tokio::time::timeout(timeout, check()).await {
        Ok(Ok(true)) => CheckResult::healthy(service, started.elapsed()),
        Ok(Ok(false)) => {
            CheckResult::unhealthy(service, "health check reported unhealthy", started.elapsed())
        }
        Ok(Err(e)) => CheckResult::unhealthy(service, e.to_string(), started.elapsed()),
        Err(_) => CheckResult::unhealthy(
            service,
            format!("health check timed out after {}ms", timeout.as_millis()),
            started.elapsed(),
        ),
    }
}

async fn run_loop(inner: Arc<Inner>, mut stop: ShutdownSignal) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(inner.check_interval) => {}
            _ = stop.recv() => {
                tracing::info!("Health monitor received stop signal, exiting loop");
                break;
            }
        }
        inner.run_cycle().await;
    }
}
