//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace layer)
//!     → /health/live   (always 200 while the process serves)
//!     → /health/ready  (availability gate over readiness services)
//! ```

pub mod server;

pub use server::{build_router, AppState, HttpServer};
