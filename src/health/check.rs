//! Health-check functions and their results.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::availability::ServiceName;
use crate::lifecycle::BoxError;

/// Result type produced by a health check.
pub type CheckOutput = Result<bool, BoxError>;

/// Type-erased async health check.
pub type HealthCheckFn = Arc<dyn Fn() -> BoxFuture<'static, CheckOutput> + Send + Sync>;

pub(crate) fn boxed<F, Fut>(check: F) -> HealthCheckFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckOutput> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, CheckOutput> { Box::pin(check()) })
}

/// Outcome of one check within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub service: ServiceName,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl CheckResult {
    pub fn healthy(service: ServiceName, duration: Duration) -> Self {
        Self {
            service,
            healthy: true,
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn unhealthy(service: ServiceName, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            service,
            healthy: false,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Open and drop a TCP connection to `address`.
pub async fn probe_tcp(address: &str, timeout: Duration) -> Result<(), BoxError> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(format!("connect to {address} failed: {e}").into()),
        Err(_) => Err(format!("connect to {address} timed out after {timeout:?}").into()),
    }
}

/// A health check that succeeds when `address` accepts TCP connections.
pub fn tcp_check(address: impl Into<String>, timeout: Duration) -> HealthCheckFn {
    let address: Arc<str> = Arc::from(address.into());
    boxed(move || {
        let address = address.clone();
        async move {
            probe_tcp(&address, timeout).await?;
            Ok::<bool, BoxError>(true)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_check_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let check = tcp_check(addr.to_string(), Duration::from_secs(1));
        assert!(check().await.unwrap());

        drop(listener);
        assert!(check().await.is_err());
    }

    #[test]
    fn test_result_serialization_skips_empty_error() {
        let result = CheckResult::healthy(ServiceName::Cache, Duration::from_millis(12));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "service": "cache", "healthy": true, "duration_ms": 12 })
        );
    }
}
