//! The two-phase connection-handshake sub-protocol.
//!
//! Compatible clients smuggle a marker through the one field of the
//! connection-establishment message the host lets them write: the plain
//! address. The wire form is
//!
//! ```text
//! <address>\0GRAFT\0<version>\0<protocol>
//! ```
//!
//! and the server must strip everything from the marker onward before the
//! host parses the field, so the host only ever sees a plain address.
//!
//! Verification is two-phase because the connection *persists* between the
//! handshake message and the join attempt - checking only at handshake time
//! would leave a window in which a connection evades the check entirely. The
//! per-connection state machine makes the race-closing property explicit:
//!
//! ```text
//! Unverified ──marker parsed──▶ Verified(version, protocol)
//!      │                              │
//!      └────────── join ──────────────┴──▶ Resolved (accept / reject)
//! ```
//!
//! `Resolved` stores nothing: every path through [`HandshakeTable::resolve`]
//! removes the record, which is the only thing bounding the table - there is
//! no expiry, just the guarantee that every connection eventually reaches
//! accept or reject.
//!
//! # Round-trip
//! ```rust
//! use hostgraft::handshake::{embed_marker, extract_marker};
//!
//! let field = embed_marker("203.0.113.5", "0.1.0", 1);
//! let payload = extract_marker(&field).unwrap();
//! assert_eq!(payload.address, "203.0.113.5");
//! assert_eq!(payload.version, "0.1.0");
//! assert_eq!(payload.protocol, 1);
//! ```

use dashmap::DashMap;

/// The private token embedded in the address field.
pub const ADDRESS_MARKER: &str = "\0GRAFT\0";

/// Handshake protocol number this build speaks.
pub const CURRENT_PROTOCOL: u32 = 1;

/// Disconnect message for clients that never presented the marker.
pub const INCOMPATIBLE_CLIENT: &str = "This server requires a compatible client.";

/// Appends the marker and compatibility data to a plain address.
pub fn embed_marker(address: &str, version: &str, protocol: u32) -> String {
    format!("{address}{ADDRESS_MARKER}{version}\0{protocol}")
}

/// Compatibility data parsed out of an address field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPayload {
    /// The plain address with marker and trailing data stripped
    pub address: String,
    /// Client build version
    pub version: String,
    /// Client protocol number; `0` when the field was unparseable
    pub protocol: u32,
}

/// Extracts the marker from an address field, if present.
///
/// Returns the stripped address together with the trailing compatibility
/// data. A malformed protocol number degrades to `0` rather than failing -
/// the join-time check will reject it as a mismatch.
pub fn extract_marker(field: &str) -> Option<MarkerPayload> {
    let at = field.find(ADDRESS_MARKER)?;
    let trailing = &field[at + ADDRESS_MARKER.len()..];
    let mut parts = trailing.split('\0');
    let version = parts.next().unwrap_or("unknown").to_string();
    let protocol = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(MarkerPayload {
        address: field[..at].to_string(),
        version,
        protocol,
    })
}

/// Where a connection stands in the handshake state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// No marker has been seen for this connection
    Unverified,
    /// A marker was parsed; awaiting the join attempt
    Verified {
        /// Client build version from the marker
        version: String,
        /// Client protocol number from the marker
        protocol: u32,
    },
}

/// Verification data held between handshake and join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRecord {
    /// Client build version
    pub client_version: String,
    /// Client protocol number
    pub protocol: u32,
}

/// Outcome of resolving a connection at join time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    /// Let the join proceed
    Accept,
    /// Disconnect with the given user-visible message
    Reject(String),
}

impl JoinDecision {
    /// True for the reject outcome.
    pub fn is_reject(&self) -> bool {
        matches!(self, JoinDecision::Reject(_))
    }
}

/// Per-connection verification records plus the join-time policy.
///
/// Records are keyed by connection identity (the remote socket address
/// string). Independent connections touch independent keys, so the table is
/// a concurrent map with no global lock.
pub struct HandshakeTable {
    records: DashMap<String, HandshakeRecord>,
    require_compatible: bool,
    running_protocol: u32,
    server_version: String,
}

impl HandshakeTable {
    /// Creates a table enforcing (or not) the require-compatible-client policy.
    pub fn new(require_compatible: bool, server_version: &str) -> Self {
        Self::with_protocol(require_compatible, server_version, CURRENT_PROTOCOL)
    }

    /// Creates a table speaking a specific protocol number.
    pub fn with_protocol(
        require_compatible: bool,
        server_version: &str,
        running_protocol: u32,
    ) -> Self {
        HandshakeTable {
            records: DashMap::new(),
            require_compatible,
            running_protocol,
            server_version: server_version.to_string(),
        }
    }

    /// Whether unverified clients are rejected at join time.
    pub fn requires_compatible(&self) -> bool {
        self.require_compatible
    }

    /// Transitions a connection to `Verified` with the parsed marker data.
    pub fn verify(&self, connection_key: &str, payload: &MarkerPayload) {
        self.records.insert(
            connection_key.to_string(),
            HandshakeRecord {
                client_version: payload.version.clone(),
                protocol: payload.protocol,
            },
        );
    }

    /// Current state of a connection.
    pub fn state(&self, connection_key: &str) -> HandshakeState {
        match self.records.get(connection_key) {
            Some(record) => HandshakeState::Verified {
                version: record.client_version.clone(),
                protocol: record.protocol,
            },
            None => HandshakeState::Unverified,
        }
    }

    /// Resolves a connection at join time.
    ///
    /// The record, if any, is consumed on every path - `Resolved` keeps no
    /// state. Outcomes:
    /// - no record and policy enabled: reject with [`INCOMPATIBLE_CLIENT`]
    /// - record with a foreign protocol number: reject naming both sides
    /// - otherwise: accept
    pub fn resolve(&self, connection_key: &str) -> JoinDecision {
        match self.records.remove(connection_key) {
            None => {
                if self.require_compatible {
                    JoinDecision::Reject(INCOMPATIBLE_CLIENT.to_string())
                } else {
                    JoinDecision::Accept
                }
            }
            Some((_, record)) => {
                if record.protocol != self.running_protocol {
                    JoinDecision::Reject(format!(
                        "Version mismatch: server={} (protocol {}), client={} (protocol {})",
                        self.server_version,
                        self.running_protocol,
                        record.client_version,
                        record.protocol
                    ))
                } else {
                    JoinDecision::Accept
                }
            }
        }
    }

    /// Number of connections currently in `Verified`.
    pub fn pending_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_extract_roundtrip() {
        let field = embed_marker("203.0.113.5", "0.1.0", 1);
        let payload = extract_marker(&field).unwrap();
        assert_eq!(payload.address, "203.0.113.5");
        assert_eq!(payload.version, "0.1.0");
        assert_eq!(payload.protocol, 1);
    }

    #[test]
    fn test_plain_address_has_no_marker() {
        assert!(extract_marker("203.0.113.5").is_none());
    }

    #[test]
    fn test_malformed_protocol_degrades_to_zero() {
        let field = format!("a.example{ADDRESS_MARKER}0.1.0\0junk");
        assert_eq!(extract_marker(&field).unwrap().protocol, 0);
        let field = format!("a.example{ADDRESS_MARKER}0.1.0");
        assert_eq!(extract_marker(&field).unwrap().protocol, 0);
    }

    #[test]
    fn test_matching_protocol_accepts_and_consumes() {
        let table = HandshakeTable::with_protocol(true, "0.1.0", 1);
        let payload = extract_marker(&embed_marker("h", "0.1.0", 1)).unwrap();
        table.verify("peer:1", &payload);
        assert!(matches!(table.state("peer:1"), HandshakeState::Verified { .. }));

        assert_eq!(table.resolve("peer:1"), JoinDecision::Accept);
        assert_eq!(table.state("peer:1"), HandshakeState::Unverified);
        assert_eq!(table.pending_count(), 0);
    }

    #[test]
    fn test_protocol_mismatch_names_both_sides() {
        let table = HandshakeTable::with_protocol(true, "0.2.0", 2);
        let payload = extract_marker(&embed_marker("h", "0.1.0", 1)).unwrap();
        table.verify("peer:1", &payload);

        let decision = table.resolve("peer:1");
        let JoinDecision::Reject(message) = decision else {
            panic!("expected rejection");
        };
        assert!(message.contains('1'));
        assert!(message.contains('2'));
        // The record is consumed by the rejection too.
        assert_eq!(table.pending_count(), 0);
    }

    #[test]
    fn test_unverified_with_policy_gets_generic_message() {
        let table = HandshakeTable::with_protocol(true, "0.1.0", 1);
        let decision = table.resolve("stranger:9");
        assert_eq!(decision, JoinDecision::Reject(INCOMPATIBLE_CLIENT.to_string()));
    }

    #[test]
    fn test_unverified_without_policy_accepts() {
        let table = HandshakeTable::with_protocol(false, "0.1.0", 1);
        assert_eq!(table.resolve("stranger:9"), JoinDecision::Accept);
    }

    #[test]
    fn test_independent_connections_do_not_interfere() {
        let table = HandshakeTable::with_protocol(true, "0.1.0", 1);
        let ok = extract_marker(&embed_marker("h", "0.1.0", 1)).unwrap();
        table.verify("a:1", &ok);
        table.verify("b:2", &ok);
        assert_eq!(table.resolve("a:1"), JoinDecision::Accept);
        assert_eq!(table.pending_count(), 1);
        assert_eq!(table.resolve("b:2"), JoinDecision::Accept);
    }
}
