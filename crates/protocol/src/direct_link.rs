//! Direct-link handshake: the alternative attach protocol
//!
//! Besides USBIP, the server accepts a lighter session-establishment
//! protocol on the same port: a 12-byte magic-tagged handshake after which
//! raw command packets flow without URB framing. The listener cannot know
//! which client is connecting, so detection runs against the first bytes
//! of every new connection; the framing here supports that sniffing.

use crate::error::{ProtocolError, Result};

/// Magic identifier opening every direct-link handshake message
pub const DIRECT_LINK_MAGIC: u32 = 0x8a65_6c70;

/// Handshake command id (the only command in the attach phase)
pub const CMD_HANDSHAKE: u32 = 0;

/// Encoded handshake length, request and response alike
pub const HANDSHAKE_LEN: usize = 12;

/// Verdict of a protocol detector run against the first bytes of a
/// connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// The bytes open this protocol; the detector's owner takes the session
    Accept,
    /// The bytes cannot belong to this protocol
    Reject,
    /// A valid prefix, but too short to decide
    NeedMoreData,
}

/// Decoded handshake request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub proxy_version: u32,
}

/// Classify a byte chunk as a direct-link handshake, or not
pub fn detect_handshake(buf: &[u8]) -> Detection {
    let magic = DIRECT_LINK_MAGIC.to_be_bytes();
    let prefix = buf.len().min(4);
    if buf[..prefix] != magic[..prefix] {
        return Detection::Reject;
    }
    if buf.len() < HANDSHAKE_LEN {
        return Detection::NeedMoreData;
    }
    if u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) != CMD_HANDSHAKE {
        return Detection::Reject;
    }
    Detection::Accept
}

/// Decode a handshake request that [`detect_handshake`] accepted
pub fn decode_handshake(buf: &[u8]) -> Result<HandshakeRequest> {
    if buf.len() < HANDSHAKE_LEN {
        return Err(ProtocolError::HeaderTooShort {
            needed: HANDSHAKE_LEN,
            available: buf.len(),
        });
    }
    match detect_handshake(buf) {
        Detection::Accept => Ok(HandshakeRequest {
            proxy_version: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }),
        _ => Err(ProtocolError::UnknownCommand(u32::from_be_bytes([
            buf[0], buf[1], buf[2], buf[3],
        ]))),
    }
}

/// Encode the handshake response advertising the server's packet size
pub fn encode_handshake_response(packet_size: u32) -> [u8; HANDSHAKE_LEN] {
    let mut buf = [0u8; HANDSHAKE_LEN];
    buf[0..4].copy_from_slice(&DIRECT_LINK_MAGIC.to_be_bytes());
    buf[4..8].copy_from_slice(&CMD_HANDSHAKE.to_be_bytes());
    buf[8..12].copy_from_slice(&packet_size.to_be_bytes());
    buf
}
