//! Compile-time configuration constants
//!
//! This core carries no config files and no CLI; packet size, queue depth
//! and port are fixed at build time. The transport mode decides the
//! command-packet size and whether queued packets carry a length prefix,
//! matching what the emulated USB function would negotiate with the host.

/// TCP port the server listens on (the conventional USBIP port)
pub const PORT: u16 = 3240;

/// Receive buffer for one TCP read, sized to a full Ethernet frame
pub const TCP_RX_BUFFER_LEN: usize = 1500;

/// How the emulated device frames command packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Vendor-specific bulk endpoints: 512-byte packets, variable length,
    /// so queued packets carry their meaningful length
    WinUsb,
    /// HID report pipe: fixed 255-byte packets, no length framing
    Hid,
}

impl TransportMode {
    /// Maximum command/response packet size for this mode
    pub const fn packet_size(self) -> usize {
        match self {
            TransportMode::WinUsb => 512,
            TransportMode::Hid => 255,
        }
    }

    /// Whether queued packets carry a meaningful byte count
    ///
    /// HID reports are always sent whole; bulk responses are trimmed to
    /// the executor's reported length.
    pub const fn has_length_prefix(self) -> bool {
        matches!(self, TransportMode::WinUsb)
    }
}

/// Transport mode this build emulates
pub const TRANSPORT_MODE: TransportMode = TransportMode::WinUsb;

/// Maximum command/response packet size for the built transport mode
pub const DAP_PACKET_SIZE: usize = TRANSPORT_MODE.packet_size();

/// Slots per pipeline queue; bounds memory held by unconsumed packets
pub const DAP_QUEUE_DEPTH: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_packet_sizes() {
        assert_eq!(TransportMode::WinUsb.packet_size(), 512);
        assert_eq!(TransportMode::Hid.packet_size(), 255);
        assert!(TransportMode::WinUsb.has_length_prefix());
        assert!(!TransportMode::Hid.has_length_prefix());
    }
}
