//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! every field has a default, so a minimal file only lists `[[services]]`.

use serde::{Deserialize, Serialize};

use crate::availability::ServiceName;
use crate::lifecycle::hook::DEFAULT_STARTUP_ORDER;

/// Root configuration for the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Public listener (liveness/readiness).
    pub server: ServerConfig,

    /// Health monitor settings.
    pub health: HealthConfig,

    /// Availability gate settings.
    pub gate: GateConfig,

    /// Operator API.
    pub admin: AdminConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// External dependencies managed by the lifecycle.
    pub services: Vec<ServiceConfig>,
}

impl ControlPlaneConfig {
    pub fn service(&self, name: ServiceName) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Health monitor and hysteresis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds between check cycles.
    pub interval_secs: u64,

    /// Per-check timeout in seconds.
    pub timeout_secs: u64,

    /// How long `stop()` waits for the loop before aborting it.
    pub stop_grace_secs: u64,

    /// Consecutive failures before a service is marked unavailable.
    pub failure_threshold: u32,

    /// Consecutive successes before a service is marked available again.
    pub recovery_threshold: u32,

    /// Mark every service available before the first check cycle.
    pub optimistic_boot: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
            stop_grace_secs: 5,
            failure_threshold: 2,
            recovery_threshold: 1,
            optimistic_boot: true,
        }
    }
}

/// Availability gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Suggested retry delay returned with 503 responses.
    pub retry_after_secs: u64,

    /// Services `/health/ready` depends on. Empty means every required service.
    pub readiness_services: Vec<ServiceName>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: 30,
            readiness_services: Vec::new(),
        }
    }
}

/// Operator API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One managed external dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Which service this entry describes.
    pub name: ServiceName,

    /// `host:port` probed at startup and by the health monitor.
    pub address: String,

    /// Position in the startup sequence (lower starts earlier).
    #[serde(default = "default_startup_order")]
    pub startup_order: i32,

    /// Services that must be up before this one starts.
    #[serde(default)]
    pub requires: Vec<ServiceName>,

    /// When false, a failed startup probe degrades instead of aborting.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Connect timeout for the startup probe, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_startup_order() -> i32 {
    DEFAULT_STARTUP_ORDER
}

fn default_required() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    5
}
