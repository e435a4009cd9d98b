//! Service lifecycle and availability control plane.

pub mod admin;
pub mod app;
pub mod availability;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use app::{build_lifecycle, AppContext};
pub use availability::{AvailabilityGate, OverrideMode, ServiceAvailabilityRegistry, ServiceName};
pub use config::ControlPlaneConfig;
pub use health::HealthMonitor;
pub use lifecycle::{HookKind, HookOutcome, HookSpec, LifecycleRegistry, Shutdown};
