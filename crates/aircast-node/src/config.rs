//! Node configuration loaded from environment variables.
//!
//! All settings have sensible defaults so a node can start with zero
//! configuration for local experiments.

use aircast_shared::constants::{DEFAULT_QUIC_PORT, DIAGNOSTICS_INTERVAL_SECS};

/// Operator-facing configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// QUIC listen port.
    /// Env: `AIRCAST_LISTEN_PORT`
    /// Default: `4001`
    pub listen_port: u16,

    /// Static bootstrap multiaddrs, comma-separated.
    /// Env: `AIRCAST_BOOTSTRAP`
    /// Default: empty
    pub bootstrap: Vec<String>,

    /// URL of the remote reference document holding the assistive relay
    /// multiaddr. Resolution failure degrades to the static list alone.
    /// Env: `AIRCAST_RELAY_REF`
    /// Default: none
    pub relay_reference: Option<String>,

    /// Seconds between diagnostics snapshots (0 disables the view).
    /// Env: `AIRCAST_DIAGNOSTICS_SECS`
    /// Default: `10`
    pub diagnostics_secs: u64,

    /// Allow dialing private/loopback addresses learned from discovery.
    /// Local testing only.
    /// Env: `AIRCAST_ALLOW_LOCAL` (true/false)
    /// Default: `false`
    pub allow_local: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_QUIC_PORT,
            bootstrap: Vec::new(),
            relay_reference: None,
            diagnostics_secs: DIAGNOSTICS_INTERVAL_SECS,
            allow_local: false,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_port: std::env::var("AIRCAST_LISTEN_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.listen_port),
            bootstrap: std::env::var("AIRCAST_BOOTSTRAP")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.bootstrap),
            relay_reference: std::env::var("AIRCAST_RELAY_REF")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            diagnostics_secs: std::env::var("AIRCAST_DIAGNOSTICS_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.diagnostics_secs),
            allow_local: std::env::var("AIRCAST_ALLOW_LOCAL")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.allow_local),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
