//! Bootstrap address handling and relay reference resolution.
//!
//! The bootstrap list is static configuration. The assistive relay address
//! is not: it is fetched at startup from a remote reference document (a
//! plain-text URL whose first non-comment line is a multiaddr) and folded
//! into the bootstrap list. Resolution failure is non-fatal; discovery
//! proceeds on the static addresses alone.

use libp2p::{multiaddr::Protocol, Multiaddr, PeerId};
use tracing::{debug, warn};

/// Parse a list of multiaddr strings into validated `Multiaddr` values.
/// Malformed entries are logged and skipped.
pub fn parse_multiaddrs(raw: &[String]) -> Vec<Multiaddr> {
    raw.iter()
        .filter_map(|s| match s.trim().parse::<Multiaddr>() {
            Ok(addr) => {
                debug!(addr = %addr, "Loaded bootstrap address");
                Some(addr)
            }
            Err(e) => {
                warn!(addr = %s, error = %e, "Skipping invalid multiaddr");
                None
            }
        })
        .collect()
}

/// Fetch the relay reference document and resolve it to a multiaddr.
pub async fn resolve_relay_addr(reference_url: &str) -> anyhow::Result<Multiaddr> {
    let body = reqwest::get(reference_url)
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_relay_reference(&body)
}

/// Extract the relay multiaddr from the reference document body: the first
/// non-empty, non-comment line.
pub fn parse_relay_reference(body: &str) -> anyhow::Result<Multiaddr> {
    let line = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| anyhow::anyhow!("Relay reference document is empty"))?;

    Ok(line.parse()?)
}

/// Extract a `PeerId` from a multiaddr, if one is present.
pub fn extract_peer_id(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|p| {
        if let Protocol::P2p(peer_id) = p {
            Some(peer_id)
        } else {
            None
        }
    })
}

/// Ensure an announced address is suffixed with the announcing peer's id,
/// so dialing verifies we reached the peer we expected.
pub fn ensure_peer_suffix(addr: Multiaddr, peer_id: PeerId) -> Multiaddr {
    if extract_peer_id(&addr).is_some() {
        addr
    } else {
        addr.with(Protocol::P2p(peer_id))
    }
}
