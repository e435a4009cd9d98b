//! Per-service availability state with hysteresis and operator overrides.
//!
//! # State Transitions
//! ```text
//! available   → unavailable: consecutive_failures  >= failure_threshold
//! unavailable → available:   consecutive_successes >= recovery_threshold
//! ```
//!
//! Overrides replace the health signal without touching the counters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tokio::sync::broadcast;

use crate::availability::service::{OverrideMode, ServiceName};
use crate::observability::metrics;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 2;
pub const DEFAULT_RECOVERY_THRESHOLD: u32 = 1;

const EVENT_CAPACITY: usize = 64;

/// Tracked state of one external service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service: ServiceName,
    /// Raw health signal after hysteresis.
    pub health_available: bool,
    pub override_mode: OverrideMode,
    pub last_check: Option<SystemTime>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_error: Option<String>,
}

impl ServiceStatus {
    fn new(service: ServiceName) -> Self {
        Self {
            service,
            health_available: false,
            override_mode: OverrideMode::None,
            last_check: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_error: None,
        }
    }

    /// Effective availability: the override wins over the health signal.
    pub fn is_available(&self) -> bool {
        match self.override_mode {
            OverrideMode::ForceEnable => true,
            OverrideMode::ForceDisable => false,
            OverrideMode::None => self.health_available,
        }
    }
}

/// A state change, emitted exactly once per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityEvent {
    HealthChanged {
        service: ServiceName,
        healthy: bool,
        error: Option<String>,
    },
    OverrideChanged {
        service: ServiceName,
        previous: OverrideMode,
        current: OverrideMode,
    },
}

/// Holds one [`ServiceStatus`] per [`ServiceName`].
///
/// Writes are serialized by a single mutex. [`is_available`] reads a cached
/// atomic and never blocks.
///
/// [`is_available`]: ServiceAvailabilityRegistry::is_available
#[derive(Debug)]
pub struct ServiceAvailabilityRegistry {
    failure_threshold: u32,
    recovery_threshold: u32,
    statuses: Mutex<Vec<ServiceStatus>>,
    available: [AtomicBool; ServiceName::COUNT],
    events: broadcast::Sender<AvailabilityEvent>,
}

impl ServiceAvailabilityRegistry {
    pub fn new() -> Self {
        Self::with_thresholds(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_THRESHOLD)
    }

    /// Thresholds below one are raised to one.
    pub fn with_thresholds(failure_threshold: u32, recovery_threshold: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_threshold: recovery_threshold.max(1),
            statuses: Mutex::new(ServiceName::ALL.into_iter().map(ServiceStatus::new).collect()),
            available: std::array::from_fn(|_| AtomicBool::new(false)),
            events,
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn recovery_threshold(&self) -> u32 {
        self.recovery_threshold
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ServiceStatus>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, status: &ServiceStatus) {
        self.available[status.service.index()].store(status.is_available(), Ordering::Release);
    }

    /// Record one health-check result.
    ///
    /// Returns the transition event when the health signal flipped.
    pub fn update_health(
        &self,
        service: ServiceName,
        is_healthy: bool,
        error: Option<String>,
    ) -> Option<AvailabilityEvent> {
        let event = {
            let mut statuses = self.lock();
            let status = &mut statuses[service.index()];
            status.last_check = Some(SystemTime::now());
            status.last_error = if is_healthy { None } else { error };

            let flipped = if is_healthy {
                status.consecutive_failures = 0;
                status.consecutive_successes = status.consecutive_successes.saturating_add(1);
                !status.health_available && status.consecutive_successes >= self.recovery_threshold
            } else {
                status.consecutive_successes = 0;
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                status.health_available && status.consecutive_failures >= self.failure_threshold
            };

            if !flipped {
                return None;
            }
            status.health_available = is_healthy;
            self.publish(status);
            AvailabilityEvent::HealthChanged {
                service,
                healthy: is_healthy,
                error: status.last_error.clone(),
            }
        };

        self.notify(&event);
        Some(event)
    }

    /// Set the operator override. Returns true when the mode changed.
    pub fn set_override(&self, service: ServiceName, mode: OverrideMode) -> bool {
        let event = {
            let mut statuses = self.lock();
            let status = &mut statuses[service.index()];
            if status.override_mode == mode {
                return false;
            }
            let previous = status.override_mode;
            status.override_mode = mode;
            self.publish(status);
            AvailabilityEvent::OverrideChanged { service, previous, current: mode }
        };

        self.notify(&event);
        true
    }

    /// Hot-path availability read.
    pub fn is_available(&self, service: ServiceName) -> bool {
        self.available[service.index()].load(Ordering::Acquire)
    }

    /// The subset of `services` that is currently unavailable.
    pub fn unavailable(&self, services: &[ServiceName]) -> Vec<ServiceName> {
        services.iter().copied().filter(|s| !self.is_available(*s)).collect()
    }

    /// Optimistically mark every service healthy before real data exists.
    pub fn mark_all_available(&self) {
        self.mark_available(&ServiceName::ALL);
    }

    /// Optimistically mark `services` healthy before real data exists.
    pub fn mark_available(&self, services: &[ServiceName]) {
        let events: Vec<AvailabilityEvent> = {
            let mut statuses = self.lock();
            services
                .iter()
                .filter_map(|service| {
                    let status = &mut statuses[service.index()];
                    let was_healthy = status.health_available;
                    status.health_available = true;
                    status.consecutive_successes = 1;
                    self.publish(status);
                    (!was_healthy).then(|| AvailabilityEvent::HealthChanged {
                        service: *service,
                        healthy: true,
                        error: None,
                    })
                })
                .collect()
        };

        tracing::info!(services = ?services, "Marked services available");
        for event in &events {
            self.notify(event);
        }
    }

    pub fn status(&self, service: ServiceName) -> ServiceStatus {
        self.lock()[service.index()].clone()
    }

    pub fn snapshot(&self) -> Vec<ServiceStatus> {
        self.lock().clone()
    }

    /// Subscribe to transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<AvailabilityEvent> {
        self.events.subscribe()
    }

    /// Return every service to its initial state. Intended for tests.
    pub fn reset(&self) {
        let mut statuses = self.lock();
        for status in statuses.iter_mut() {
            *status = ServiceStatus::new(status.service);
            self.publish(status);
        }
    }

    fn notify(&self, event: &AvailabilityEvent) {
        match event {
            AvailabilityEvent::HealthChanged { service, healthy: true, .. } => {
                tracing::info!(service = %service, "Service recovered");
                metrics::record_transition(service.as_str(), "health", true);
            }
            AvailabilityEvent::HealthChanged { service, healthy: false, error } => {
                tracing::warn!(
                    service = %service,
                    error = error.as_deref().unwrap_or("unhealthy"),
                    "Service marked unavailable"
                );
                metrics::record_transition(service.as_str(), "health", false);
            }
            AvailabilityEvent::OverrideChanged { service, previous, current } => {
                tracing::warn!(
                    service = %service,
                    previous = %previous,
                    current = %current,
                    "Service override changed"
                );
                metrics::record_transition(service.as_str(), "override", self.is_available(*service));
            }
        }

        let service = match event {
            AvailabilityEvent::HealthChanged { service, .. }
            | AvailabilityEvent::OverrideChanged { service, .. } => *service,
        };
        metrics::record_service_available(service.as_str(), self.is_available(service));

        // No subscribers is the normal case.
        let _ = self.events.send(event.clone());
    }
}

impl Default for ServiceAvailabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: ServiceName = ServiceName::Database;

    fn fail(registry: &ServiceAvailabilityRegistry, service: ServiceName) -> Option<AvailabilityEvent> {
        registry.update_health(service, false, Some("connection refused".into()))
    }

    #[test]
    fn test_starts_unavailable() {
        let registry = ServiceAvailabilityRegistry::new();
        for service in ServiceName::ALL {
            assert!(!registry.is_available(service));
        }
    }

    #[test]
    fn test_single_failure_does_not_flip() {
        let registry = ServiceAvailabilityRegistry::with_thresholds(2, 1);
        for _ in 0..5 {
            registry.update_health(DB, true, None);
        }
        assert!(registry.is_available(DB));

        assert!(fail(&registry, DB).is_none());
        assert!(registry.is_available(DB));

        let event = fail(&registry, DB);
        assert_eq!(
            event,
            Some(AvailabilityEvent::HealthChanged {
                service: DB,
                healthy: false,
                error: Some("connection refused".into()),
            })
        );
        assert!(!registry.is_available(DB));
    }

    #[test]
    fn test_interleaved_results_never_flip() {
        let registry = ServiceAvailabilityRegistry::with_thresholds(2, 1);
        registry.update_health(DB, true, None);
        for _ in 0..10 {
            assert!(fail(&registry, DB).is_none());
            assert!(registry.update_health(DB, true, None).is_none());
        }
        assert!(registry.is_available(DB));
    }

    #[test]
    fn test_single_success_recovers() {
        let registry = ServiceAvailabilityRegistry::with_thresholds(2, 1);
        registry.update_health(DB, true, None);
        fail(&registry, DB);
        fail(&registry, DB);
        fail(&registry, DB);
        assert!(!registry.is_available(DB));

        assert!(registry.update_health(DB, true, None).is_some());
        assert!(registry.is_available(DB));
        let status = registry.status(DB);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.consecutive_successes, 1);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_recovery_threshold_requires_streak() {
        let registry = ServiceAvailabilityRegistry::with_thresholds(1, 3);
        assert!(registry.update_health(DB, true, None).is_none());
        assert!(registry.update_health(DB, true, None).is_none());
        assert!(!registry.is_available(DB));
        assert!(registry.update_health(DB, true, None).is_some());
        assert!(registry.is_available(DB));
    }

    #[test]
    fn test_zero_thresholds_are_clamped() {
        let registry = ServiceAvailabilityRegistry::with_thresholds(0, 0);
        assert_eq!(registry.failure_threshold(), 1);
        assert_eq!(registry.recovery_threshold(), 1);
    }

    #[test]
    fn test_force_disable_overrides_health() {
        let registry = ServiceAvailabilityRegistry::new();
        registry.update_health(DB, true, None);
        fail(&registry, DB);
        assert!(registry.is_available(DB));

        assert!(registry.set_override(DB, OverrideMode::ForceDisable));
        assert!(!registry.is_available(DB));
        assert!(registry.status(DB).health_available);

        assert!(registry.set_override(DB, OverrideMode::None));
        assert!(registry.is_available(DB));
        assert_eq!(registry.status(DB).consecutive_failures, 1);
    }

    #[test]
    fn test_force_enable_overrides_health() {
        let registry = ServiceAvailabilityRegistry::new();
        registry.set_override(ServiceName::Cache, OverrideMode::ForceEnable);
        assert!(registry.is_available(ServiceName::Cache));
        assert!(!registry.status(ServiceName::Cache).health_available);
    }

    #[test]
    fn test_repeated_override_is_not_a_transition() {
        let registry = ServiceAvailabilityRegistry::new();
        let mut events = registry.subscribe();
        assert!(registry.set_override(DB, OverrideMode::ForceDisable));
        assert!(!registry.set_override(DB, OverrideMode::ForceDisable));

        assert!(matches!(
            events.try_recv(),
            Ok(AvailabilityEvent::OverrideChanged { current: OverrideMode::ForceDisable, .. })
        ));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_events_emitted_once_per_transition() {
        let registry = ServiceAvailabilityRegistry::with_thresholds(2, 1);
        let mut events = registry.subscribe();

        registry.update_health(DB, true, None);
        registry.update_health(DB, true, None);
        fail(&registry, DB);
        fail(&registry, DB);
        fail(&registry, DB);

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_mark_all_available() {
        let registry = ServiceAvailabilityRegistry::new();
        registry.mark_all_available();
        for status in registry.snapshot() {
            assert!(status.health_available);
            assert_eq!(status.consecutive_successes, 1);
            assert!(registry.is_available(status.service));
        }

        // One failure after the optimistic bootstrap stays below the threshold.
        fail(&registry, DB);
        assert!(registry.is_available(DB));
    }

    #[test]
    fn test_mark_available_leaves_other_services_alone() {
        let registry = ServiceAvailabilityRegistry::new();
        registry.mark_available(&[DB, ServiceName::Auth]);

        assert!(registry.is_available(DB));
        assert!(registry.is_available(ServiceName::Auth));
        assert!(!registry.is_available(ServiceName::Cache));
        assert!(!registry.status(ServiceName::Cache).health_available);
    }

    #[test]
    fn test_unavailable_lists_only_down_services() {
        let registry = ServiceAvailabilityRegistry::new();
        registry.update_health(ServiceName::Cache, true, None);
        let down = registry.unavailable(&[ServiceName::Cache, ServiceName::Broker]);
        assert_eq!(down, vec![ServiceName::Broker]);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let registry = ServiceAvailabilityRegistry::new();
        registry.mark_all_available();
        registry.set_override(DB, OverrideMode::ForceDisable);
        registry.reset();

        let status = registry.status(DB);
        assert_eq!(status, ServiceStatus::new(DB));
        assert!(!registry.is_available(DB));
    }
}
