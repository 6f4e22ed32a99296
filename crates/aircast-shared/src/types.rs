use serde::{Deserialize, Serialize};

/// Transport classification of a live connection, derived from the remote
/// multiaddress. Every connection falls into exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    CircuitRelay,
    WebRtc,
    WebRtcDirect,
    WebSockets,
    WebSocketsSecure,
    WebTransport,
    Other,
}

impl TransportKind {
    /// All kinds in display order. The diagnostics histogram is keyed on
    /// this list so every category appears even at zero.
    pub const ALL: [TransportKind; 7] = [
        TransportKind::CircuitRelay,
        TransportKind::WebRtc,
        TransportKind::WebRtcDirect,
        TransportKind::WebSockets,
        TransportKind::WebSocketsSecure,
        TransportKind::WebTransport,
        TransportKind::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransportKind::CircuitRelay => "Circuit Relay",
            TransportKind::WebRtc => "WebRTC",
            TransportKind::WebRtcDirect => "WebRTC Direct",
            TransportKind::WebSockets => "WebSockets",
            TransportKind::WebSocketsSecure => "WebSockets (secure)",
            TransportKind::WebTransport => "WebTransport",
            TransportKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Role annotation for a connected peer, shown in diagnostics.
/// A peer can hold several roles at once, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerRole {
    /// Listed in the static bootstrap configuration
    Bootstrap,
    /// A relay we currently hold a reservation on
    Relay,
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerRole::Bootstrap => f.write_str("bootstrap"),
            PeerRole::Relay => f.write_str("relay"),
        }
    }
}
