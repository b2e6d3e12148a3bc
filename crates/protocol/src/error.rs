//! Protocol error types

use thiserror::Error;

/// Wire-level errors
///
/// Framing errors are local and non-fatal to a session: the request that
/// produced them is dropped and no response is sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than the fixed header it should contain
    #[error("Header too short: needed {needed} bytes, got {available}")]
    HeaderTooShort { needed: usize, available: usize },

    /// Command id not part of the protocol
    #[error("Unknown command: {0:#x}")]
    UnknownCommand(u32),

    /// URB addressed to an endpoint the emulated device does not expose
    #[error("Unknown endpoint: {0:#x}")]
    UnknownEndpoint(u32),

    /// Payload shorter than the length its header declares
    #[error("Truncated packet: expected {expected} bytes, got {actual}")]
    TruncatedPacket { expected: usize, actual: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::HeaderTooShort {
            needed: 48,
            available: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("needed 48"));
        assert!(msg.contains("got 10"));
    }

    #[test]
    fn test_unknown_endpoint_display() {
        let msg = format!("{}", ProtocolError::UnknownEndpoint(0x81));
        assert!(msg.contains("0x81"));
    }
}
