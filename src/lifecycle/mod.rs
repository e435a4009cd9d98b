//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (hook.rs):
//!     HookSpec { name, startup_order, requires } + HookKind → LifecycleHook
//!
//! Startup (registry.rs):
//!     Resolve topological order → run hooks one at a time → mark started
//!
//! Shutdown (registry.rs):
//!     Reverse of successful startup → run paired shutdown hooks → log failures
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → leave serve loop → shutdown phase
//! ```
//!
//! # Design Decisions
//! - Configuration errors (missing/circular dependency) abort before any hook runs
//! - Startup is fail-fast; shutdown is exhaustive
//! - Hooks report `HookOutcome` so skip/degrade is explicit, not exception-driven

pub mod hook;
pub mod registry;
pub mod shutdown;
pub mod signals;

pub use hook::{BoxError, HookKind, HookOutcome, HookResult, HookSpec, LifecycleError};
pub use registry::{LifecycleRegistry, ShutdownReport, StartupReport};
pub use shutdown::{Shutdown, ShutdownSignal};
