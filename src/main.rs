//! Service lifecycle and availability control plane.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        CONTROL PLANE                         │
//!   │                                                              │
//!   │  ┌───────────────────┐   startup (dependency order)          │
//!   │  │ LifecycleRegistry │──────────────┐                        │
//!   │  └───────────────────┘              ▼                        │
//!   │           │              ┌──────────────────┐                │
//!   │           │              │  service hooks   │── probe ──▶ deps
//!   │           │              └──────────────────┘                │
//!   │           ▼                                                  │
//!   │  ┌───────────────────┐   poll   ┌────────────────────────┐   │
//!   │  │   HealthMonitor   │─────────▶│ ServiceAvailability    │   │
//!   │  └───────────────────┘          │ Registry (hysteresis)  │   │
//!   │                                 └───────────┬────────────┘   │
//!   │                                             │ is_available   │
//!   │   Request ──▶ /health/ready ──▶ Availability Gate ──▶ 503    │
//!   │   Operator ──▶ /admin/* (overrides, manual checks)           │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use control_plane::app::{self, build_lifecycle, AppContext};
use control_plane::config::{load_config, ControlPlaneConfig};
use control_plane::lifecycle::signals;
use control_plane::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "control-plane")]
#[command(about = "Dependency-ordered startup with health-gated availability", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ControlPlaneConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        services = config.services.len(),
        interval_secs = config.health.interval_secs,
        "control-plane starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let mut lifecycle = build_lifecycle(&config)?;
    let ctx = Arc::new(AppContext::new(config));
    app::run(&mut lifecycle, ctx, signals::wait_for_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
