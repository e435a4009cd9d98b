//! Service availability subsystem.
//!
//! # Data Flow
//! ```text
//! HealthMonitor cycle
//!     → registry.rs update_health (hysteresis under one lock)
//!     → cached AtomicBool per service
//!
//! Operator (admin API)
//!     → registry.rs set_override
//!
//! Request path
//!     → gate.rs check / enforce middleware
//!     → registry.rs is_available (lock-free)
//!     → 503 + Retry-After when a required service is down
//! ```
//!
//! # Design Decisions
//! - Closed set of services: per-service state lives in fixed tables
//! - One notification (log, metric, event) per actual transition
//! - Overrides never reset the hysteresis counters

pub mod gate;
pub mod registry;
pub mod service;

pub use gate::{enforce, AvailabilityGate, RequiredServices, ServiceUnavailable};
pub use registry::{AvailabilityEvent, ServiceAvailabilityRegistry, ServiceStatus};
pub use service::{OverrideMode, ServiceName};
