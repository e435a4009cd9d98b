//! Known external services and operator override modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External dependencies tracked by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceName {
    Database,
    Cache,
    Broker,
    Storage,
    Auth,
    Discovery,
}

impl ServiceName {
    pub const COUNT: usize = 6;

    pub const ALL: [ServiceName; Self::COUNT] = [
        ServiceName::Database,
        ServiceName::Cache,
        ServiceName::Broker,
        ServiceName::Storage,
        ServiceName::Auth,
        ServiceName::Discovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Database => "database",
            ServiceName::Cache => "cache",
            ServiceName::Broker => "broker",
            ServiceName::Storage => "storage",
            ServiceName::Auth => "auth",
            ServiceName::Discovery => "discovery",
        }
    }

    /// Dense index into per-service tables.
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown service '{0}'")]
pub struct ParseServiceError(pub String);

impl FromStr for ServiceName {
    type Err = ParseServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .into_iter()
            .find(|service| service.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseServiceError(s.to_string()))
    }
}

/// Operator-controlled replacement for the health signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    #[default]
    None,
    ForceEnable,
    ForceDisable,
}

impl OverrideMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideMode::None => "none",
            OverrideMode::ForceEnable => "force_enable",
            OverrideMode::ForceDisable => "force_disable",
        }
    }
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown override mode '{0}' (expected none, force_enable or force_disable)")]
pub struct ParseOverrideError(pub String);

impl FromStr for OverrideMode {
    type Err = ParseOverrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(OverrideMode::None),
            "force_enable" => Ok(OverrideMode::ForceEnable),
            "force_disable" => Ok(OverrideMode::ForceDisable),
            _ => Err(ParseOverrideError(s.to_string())),
        }
    }
}
