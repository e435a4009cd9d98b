//! Request-path availability gate.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::availability::registry::ServiceAvailabilityRegistry;
use crate::availability::service::ServiceName;
use crate::observability::metrics;

pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Rejection raised when a required dependency is down.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error(
    "service(s) unavailable: {}; retry after {retry_after_seconds}s",
    join_names(.unavailable_services)
)]
pub struct ServiceUnavailable {
    pub unavailable_services: Vec<ServiceName>,
    pub retry_after_seconds: u64,
}

fn join_names(services: &[ServiceName]) -> String {
    services.iter().map(ServiceName::as_str).collect::<Vec<_>>().join(", ")
}

impl IntoResponse for ServiceUnavailable {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_seconds.to_string();
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, retry_after)],
            Json(self),
        )
            .into_response()
    }
}

/// Synchronous availability check for request handlers.
#[derive(Debug, Clone)]
pub struct AvailabilityGate {
    registry: Arc<ServiceAvailabilityRegistry>,
    retry_after: Duration,
}

impl AvailabilityGate {
    pub fn new(registry: Arc<ServiceAvailabilityRegistry>) -> Self {
        Self { registry, retry_after: DEFAULT_RETRY_AFTER }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn registry(&self) -> &Arc<ServiceAvailabilityRegistry> {
        &self.registry
    }

    /// Fail if any of `required` is unavailable.
    pub fn check(&self, required: &[ServiceName]) -> Result<(), ServiceUnavailable> {
        let unavailable = self.registry.unavailable(required);
        if unavailable.is_empty() {
            return Ok(());
        }

        for service in &unavailable {
            metrics::record_gate_rejection(service.as_str());
        }
        tracing::debug!(services = %join_names(&unavailable), "Request rejected by availability gate");
        Err(ServiceUnavailable {
            unavailable_services: unavailable,
            retry_after_seconds: self.retry_after.as_secs().max(1),
        })
    }
}

/// Middleware state naming the services a route depends on.
///
/// ```ignore
/// router.layer(axum::middleware::from_fn_with_state(
///     RequiredServices::new(gate, [ServiceName::Database]),
///     enforce,
/// ))
/// ```
#[derive(Debug, Clone)]
pub struct RequiredServices {
    gate: AvailabilityGate,
    services: Arc<[ServiceName]>,
}

impl RequiredServices {
    pub fn new(gate: AvailabilityGate, services: impl IntoIterator<Item = ServiceName>) -> Self {
        Self { gate, services: services.into_iter().collect() }
    }
}

/// Reject the request with 503 when a required service is down.
pub async fn enforce(
    State(required): State<RequiredServices>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceUnavailable> {
    required.gate.check(&required.services)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_when_all_available() {
        let registry = Arc::new(ServiceAvailabilityRegistry::new());
        registry.mark_all_available();
        let gate = AvailabilityGate::new(registry);
        assert!(gate.check(&[ServiceName::Database, ServiceName::Cache]).is_ok());
        assert!(gate.check(&[]).is_ok());
    }

    #[test]
    fn test_check_lists_unavailable_services() {
        let registry = Arc::new(ServiceAvailabilityRegistry::new());
        registry.update_health(ServiceName::Database, true, None);
        let gate = AvailabilityGate::new(registry).with_retry_after(Duration::from_secs(15));

        let err = gate
            .check(&[ServiceName::Database, ServiceName::Cache, ServiceName::Auth])
            .unwrap_err();
        assert_eq!(err.unavailable_services, vec![ServiceName::Cache, ServiceName::Auth]);
        assert_eq!(err.retry_after_seconds, 15);
        assert_eq!(err.to_string(), "service(s) unavailable: cache, auth; retry after 15s");
    }

    #[test]
    fn test_payload_shape() {
        let err = ServiceUnavailable {
            unavailable_services: vec![ServiceName::Broker],
            retry_after_seconds: 30,
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "unavailableServices": ["broker"], "retryAfterSeconds": 30 })
        );
    }
}
