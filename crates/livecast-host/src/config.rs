//! Host configuration file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use livecast_engine::SessionOptions;

/// Settings read by the host at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// `tracing` filter directives. `RUST_LOG` is used when unset.
    pub log_filter: Option<String>,

    /// Defaults for every session the host creates.
    pub session: SessionOptions,
}

impl HostConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid host configuration")
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read host configuration {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("In {}", path.display()))
    }
}
