//! Registry configuration.
//!
//! Everything has a default, so a bare `registry` invocation works on any
//! LAN. A TOML config file can override any field, and `--port` on the
//! command line overrides the file.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration for the Registry service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Command TCP port. 0 means OS-assigned; the actual port is
    /// advertised via discovery.
    pub command_port: u16,
    /// Status multicast settings.
    pub status: StatusConfig,
    /// Discovery announcer settings.
    pub discovery: DiscoveryConfig,
    /// How long shutdown waits for in-flight requests, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            command_port: 0,
            status: StatusConfig::default(),
            discovery: DiscoveryConfig::default(),
            shutdown_grace_ms: 2_000,
        }
    }
}

impl RegistryConfig {
    /// Loads a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Where catalog change events are multicast.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Whether events are published at all.
    pub enabled: bool,
    /// Multicast group for status datagrams.
    pub group: Ipv4Addr,
    /// UDP port on the group.
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group: Ipv4Addr::new(239, 17, 12, 1),
            port: 9_999,
        }
    }
}

/// mDNS announcer and duplicate-probe settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Whether the announcer (and the duplicate probe) run at all.
    /// Disabling discovery also disables the one-Registry-per-network
    /// check, so it is only meant for tests and single-host setups.
    pub enabled: bool,
    /// Socket poll timeout for the announcer thread, in milliseconds.
    /// The stop flag is observed within one tick.
    pub poll_interval_ms: u64,
    /// Length of the startup window spent probing for an existing
    /// Registry, in milliseconds.
    pub probe_window_ms: u64,
    /// How many probe queries are spread over the window.
    pub probe_attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 2_000,
            probe_window_ms: 1_500,
            probe_attempts: 2,
        }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn probe_window(&self) -> Duration {
        Duration::from_millis(self.probe_window_ms)
    }
}
