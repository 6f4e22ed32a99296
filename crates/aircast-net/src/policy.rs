//! Pluggable dial policy for discovered addresses.
//!
//! Discovery announcements can carry arbitrary multiaddrs. The policy
//! decides which of them the node will dial; it is injected at node
//! construction so tests and local setups can open it up while production
//! stays conservative.

use libp2p::{multiaddr::Protocol, Multiaddr};

/// Decides whether a discovered address may be dialed.
pub trait DialPolicy: Send + Sync {
    fn allow_dial(&self, addr: &Multiaddr) -> bool;
}

/// Production default: reject loopback, private-range and unspecified IP
/// addresses; allow DNS names and public IPs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowGlobal;

impl DialPolicy for AllowGlobal {
    fn allow_dial(&self, addr: &Multiaddr) -> bool {
        match addr.iter().next() {
            Some(Protocol::Ip4(ip)) => {
                !(ip.is_loopback()
                    || ip.is_private()
                    || ip.is_link_local()
                    || ip.is_unspecified())
            }
            Some(Protocol::Ip6(ip)) => !(ip.is_loopback() || ip.is_unspecified()),
            Some(Protocol::Dns(_))
            | Some(Protocol::Dns4(_))
            | Some(Protocol::Dns6(_))
            | Some(Protocol::Dnsaddr(_)) => true,
            _ => false,
        }
    }
}

/// Accept every address. Local testing only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl DialPolicy for AllowAll {
    fn allow_dial(&self, _addr: &Multiaddr) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_allow_global_rejects_local_ranges() {
        let policy = AllowGlobal;
        assert!(!policy.allow_dial(&addr("/ip4/127.0.0.1/udp/4001/quic-v1")));
        assert!(!policy.allow_dial(&addr("/ip4/192.168.1.10/udp/4001/quic-v1")));
        assert!(!policy.allow_dial(&addr("/ip4/10.0.0.7/tcp/80/ws")));
        assert!(!policy.allow_dial(&addr("/ip4/0.0.0.0/udp/4001/quic-v1")));
        assert!(!policy.allow_dial(&addr("/ip6/::1/udp/4001/quic-v1")));
    }

    #[test]
    fn test_allow_global_accepts_public_addresses() {
        let policy = AllowGlobal;
        assert!(policy.allow_dial(&addr("/ip4/203.0.113.5/udp/4001/quic-v1")));
        assert!(policy.allow_dial(&addr("/dns4/relay.example/tcp/443/wss")));
    }

    #[test]
    fn test_allow_all_accepts_everything() {
        let policy = AllowAll;
        assert!(policy.allow_dial(&addr("/ip4/127.0.0.1/udp/4001/quic-v1")));
        assert!(policy.allow_dial(&addr("/ip4/203.0.113.5/udp/4001/quic-v1")));
    }
}
