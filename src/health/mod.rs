//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (check.rs):
//!     ServiceName + async fn → HealthCheckFn (one per service)
//!
//! Cycle (monitor.rs):
//!     Spawn every check with its own timeout
//!     → join all (panics and timeouts become unhealthy results)
//!     → ServiceAvailabilityRegistry::update_health
//!
//! Loop (monitor.rs):
//!     start: one synchronous cycle, then spawn
//!     wait(interval) or stop signal → cycle → repeat
//! ```
//!
//! # Design Decisions
//! - One check's crash or timeout never hides another's result
//! - Cycles are serialized; manual triggers wait for a running cycle
//! - Stop is bounded by a grace period, then the task is aborted

pub mod check;
pub mod monitor;

pub use check::{probe_tcp, tcp_check, CheckOutput, CheckResult, HealthCheckFn};
pub use monitor::{HealthMonitor, MonitorState};
