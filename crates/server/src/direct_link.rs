//! Direct-link protocol integration
//!
//! The probe side of the alternative attach path: a detector for the
//! session's protocol-sniffing list, and the boundary trait for the
//! data-phase handler, which lives outside this core. Once a connection
//! completes the direct-link handshake it stays in the data phase for the
//! connection's lifetime and the packet pipeline is torn down.

use protocol::direct_link::{Detection, detect_handshake};
use tracing::debug;

use crate::session::ProtocolProbe;

/// Detects the direct-link handshake in the attach phase
#[derive(Debug, Default)]
pub struct DirectLinkProbe;

impl ProtocolProbe for DirectLinkProbe {
    fn name(&self) -> &'static str {
        "direct-link"
    }

    fn detect(&self, buf: &[u8]) -> Detection {
        detect_handshake(buf)
    }
}

/// Data-phase handler for a direct-link session (external collaborator)
pub trait DirectLinkHandler: Send {
    /// Process one data-phase chunk; any returned bytes are written back
    /// to the peer
    fn process(&mut self, chunk: &[u8]) -> Option<Vec<u8>>;

    /// Release per-connection resources on disconnect
    fn reset(&mut self);
}

/// Stub handler used when no real direct-link engine is wired in
#[derive(Debug, Default)]
pub struct NullDirectLinkHandler;

impl DirectLinkHandler for NullDirectLinkHandler {
    fn process(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        debug!("direct-link data dropped: {} bytes (no handler)", chunk.len());
        None
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::direct_link::{DIRECT_LINK_MAGIC, HANDSHAKE_LEN};

    #[test]
    fn test_probe_accepts_handshake() {
        let mut buf = [0u8; HANDSHAKE_LEN];
        buf[0..4].copy_from_slice(&DIRECT_LINK_MAGIC.to_be_bytes());
        let probe = DirectLinkProbe;
        assert_eq!(probe.detect(&buf), Detection::Accept);
    }

    #[test]
    fn test_probe_rejects_urb_traffic() {
        let probe = DirectLinkProbe;
        assert_eq!(probe.detect(&[0u8; 48]), Detection::Reject);
    }
}
