//! USBIP stage-2: URB submit and unlink traffic
//!
//! After a successful attach, the host speaks stage-2: a fixed 48-byte URB
//! header per message, optionally followed by a payload. The header is a
//! 20-byte base (command, sequence, device id, direction, endpoint) plus a
//! 28-byte command-specific block. Every integer field is big-endian on
//! the wire except the embedded 8-byte setup block, which is carried
//! opaque and must never be byte-swapped.
//!
//! Decoding and encoding go field by field at explicit offsets; no part of
//! this codec reinterprets memory in place.

use crate::error::{ProtocolError, Result};

/// Full URB header length, requests and replies alike
pub const URB_HEADER_LEN: usize = 48;
/// Length of the opaque setup block at the tail of a submit request
pub const SETUP_LEN: usize = 8;

/// Request: submit an URB
pub const CMD_SUBMIT: u32 = 1;
/// Request: unlink (cancel) a previously submitted URB
pub const CMD_UNLINK: u32 = 2;
/// Reply to CMD_SUBMIT
pub const RET_SUBMIT: u32 = 3;
/// Reply to CMD_UNLINK
pub const RET_UNLINK: u32 = 4;

/// Host-to-device transfer direction
pub const DIR_OUT: u32 = 0;
/// Device-to-host transfer direction
pub const DIR_IN: u32 = 1;

/// Common base shared by every stage-2 message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrbBase {
    pub command: u32,
    pub seqnum: u32,
    pub devid: u32,
    pub direction: u32,
    pub ep: u32,
}

/// Command-specific block of a submit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitRequest {
    pub transfer_flags: u32,
    pub transfer_buffer_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub interval: u32,
    /// Raw USB SETUP packet, opaque to this codec
    pub setup: [u8; SETUP_LEN],
}

/// Command-specific block of an unlink request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlinkRequest {
    /// Sequence number of the URB the host wants cancelled
    pub victim_seqnum: u32,
}

/// The two request shapes a stage-2 peer may send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrbRequest {
    Submit(SubmitRequest),
    Unlink(UnlinkRequest),
}

/// A decoded stage-2 request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrbHeader {
    pub base: UrbBase,
    pub request: UrbRequest,
}

fn be32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn put32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

impl UrbHeader {
    /// Decode a stage-2 request header from network byte order
    ///
    /// Fails with [`ProtocolError::HeaderTooShort`] if fewer than 48 bytes
    /// are available and [`ProtocolError::UnknownCommand`] for command ids
    /// that are not CMD_SUBMIT or CMD_UNLINK.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < URB_HEADER_LEN {
            return Err(ProtocolError::HeaderTooShort {
                needed: URB_HEADER_LEN,
                available: buf.len(),
            });
        }

        let base = UrbBase {
            command: be32(buf, 0),
            seqnum: be32(buf, 4),
            devid: be32(buf, 8),
            direction: be32(buf, 12),
            ep: be32(buf, 16),
        };

        let request = match base.command {
            CMD_SUBMIT => {
                let mut setup = [0u8; SETUP_LEN];
                setup.copy_from_slice(&buf[40..48]);
                UrbRequest::Submit(SubmitRequest {
                    transfer_flags: be32(buf, 20),
                    transfer_buffer_length: be32(buf, 24),
                    start_frame: be32(buf, 28),
                    number_of_packets: be32(buf, 32),
                    interval: be32(buf, 36),
                    setup,
                })
            }
            CMD_UNLINK => UrbRequest::Unlink(UnlinkRequest {
                victim_seqnum: be32(buf, 20),
            }),
            other => return Err(ProtocolError::UnknownCommand(other)),
        };

        Ok(Self { base, request })
    }

    /// Encode back to network byte order
    ///
    /// The setup block is copied byte for byte, never swapped.
    pub fn encode(&self) -> [u8; URB_HEADER_LEN] {
        let mut buf = [0u8; URB_HEADER_LEN];
        put32(&mut buf, 0, self.base.command);
        put32(&mut buf, 4, self.base.seqnum);
        put32(&mut buf, 8, self.base.devid);
        put32(&mut buf, 12, self.base.direction);
        put32(&mut buf, 16, self.base.ep);
        match self.request {
            UrbRequest::Submit(submit) => {
                put32(&mut buf, 20, submit.transfer_flags);
                put32(&mut buf, 24, submit.transfer_buffer_length);
                put32(&mut buf, 28, submit.start_frame);
                put32(&mut buf, 32, submit.number_of_packets);
                put32(&mut buf, 36, submit.interval);
                buf[40..48].copy_from_slice(&submit.setup);
            }
            UrbRequest::Unlink(unlink) => {
                put32(&mut buf, 20, unlink.victim_seqnum);
            }
        }
        buf
    }
}

/// Build a RET_SUBMIT reply header from the request it answers
///
/// The reply reuses the request's sequence context, flips the transfer
/// direction and zeroes the command-specific block before filling in
/// status and actual data length.
pub fn encode_submit_reply(base: &UrbBase, status: i32, data_length: i32) -> [u8; URB_HEADER_LEN] {
    let mut buf = [0u8; URB_HEADER_LEN];
    put32(&mut buf, 0, RET_SUBMIT);
    put32(&mut buf, 4, base.seqnum);
    put32(&mut buf, 8, base.devid);
    put32(&mut buf, 12, base.direction ^ 1);
    put32(&mut buf, 16, base.ep);
    put32(&mut buf, 20, status as u32);
    put32(&mut buf, 24, data_length as u32);
    // start_frame, number_of_packets, error_count and the trailing pad
    // stay zero.
    buf
}

/// Build a RET_UNLINK reply header
///
/// The peer only distinguishes zero from non-zero status; the fixed
/// direction is OUT.
pub fn encode_unlink_reply(base: &UrbBase, status: i32) -> [u8; URB_HEADER_LEN] {
    let mut buf = [0u8; URB_HEADER_LEN];
    put32(&mut buf, 0, RET_UNLINK);
    put32(&mut buf, 4, base.seqnum);
    put32(&mut buf, 8, base.devid);
    put32(&mut buf, 12, DIR_OUT);
    put32(&mut buf, 16, base.ep);
    put32(&mut buf, 20, status as u32);
    buf
}

/// Raw-byte shape check for the host's response-poll URB
///
/// The USBIP host driver polls for command responses with a bare 48-byte
/// submit request on endpoint 1, direction IN. Matching that shape on the
/// raw bytes lets the fast-reply path skip the full header decode.
pub fn is_response_poll(buf: &[u8]) -> bool {
    buf.len() == URB_HEADER_LEN
        && be32(buf, 0) == CMD_SUBMIT
        && be32(buf, 12) == DIR_IN
        && be32(buf, 16) == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_submit() -> UrbHeader {
        UrbHeader {
            base: UrbBase {
                command: CMD_SUBMIT,
                seqnum: 0xDEAD_BEEF,
                devid: 0x0001_0002,
                direction: DIR_OUT,
                ep: 1,
            },
            request: UrbRequest::Submit(SubmitRequest {
                transfer_flags: 0,
                transfer_buffer_length: 64,
                start_frame: 0,
                number_of_packets: 0,
                interval: 0,
                setup: [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00],
            }),
        }
    }

    #[test]
    fn test_submit_roundtrip() {
        let header = sample_submit();
        let decoded = UrbHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_setup_preserved_verbatim() {
        // The setup block must survive both directions byte for byte even
        // though every other field is byte-swapped.
        let header = sample_submit();
        let wire = header.encode();
        assert_eq!(&wire[40..48], &[0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]);
        let UrbRequest::Submit(submit) = UrbHeader::decode(&wire).unwrap().request else {
            panic!("expected submit request");
        };
        assert_eq!(submit.setup, [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn test_unlink_roundtrip() {
        let header = UrbHeader {
            base: UrbBase {
                command: CMD_UNLINK,
                seqnum: 7,
                devid: 0x0001_0002,
                direction: DIR_IN,
                ep: 1,
            },
            request: UrbRequest::Unlink(UnlinkRequest { victim_seqnum: 6 }),
        };
        let decoded = UrbHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_short_header_rejected() {
        assert_eq!(
            UrbHeader::decode(&[0u8; 10]),
            Err(ProtocolError::HeaderTooShort {
                needed: 48,
                available: 10
            })
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut wire = sample_submit().encode();
        wire[0..4].copy_from_slice(&99u32.to_be_bytes());
        assert_eq!(
            UrbHeader::decode(&wire),
            Err(ProtocolError::UnknownCommand(99))
        );
    }

    #[test]
    fn test_submit_reply_flips_direction_and_zeroes_block() {
        let header = sample_submit();
        let reply = encode_submit_reply(&header.base, 0, 32);
        assert_eq!(be32(&reply, 0), RET_SUBMIT);
        assert_eq!(be32(&reply, 4), header.base.seqnum);
        assert_eq!(be32(&reply, 12), DIR_IN);
        assert_eq!(be32(&reply, 20), 0);
        assert_eq!(be32(&reply, 24), 32);
        assert_eq!(&reply[28..48], &[0u8; 20]);
    }

    #[test]
    fn test_unlink_reply_nonzero_status() {
        let base = UrbBase {
            command: CMD_UNLINK,
            seqnum: 9,
            devid: 0,
            direction: DIR_IN,
            ep: 1,
        };
        let reply = encode_unlink_reply(&base, -1);
        assert_eq!(be32(&reply, 0), RET_UNLINK);
        assert_eq!(be32(&reply, 12), DIR_OUT);
        assert_eq!(be32(&reply, 20) as i32, -1);
    }

    #[test]
    fn test_response_poll_shape() {
        let poll = UrbHeader {
            base: UrbBase {
                command: CMD_SUBMIT,
                seqnum: 1,
                devid: 0,
                direction: DIR_IN,
                ep: 1,
            },
            request: UrbRequest::Submit(SubmitRequest {
                transfer_flags: 0,
                transfer_buffer_length: 512,
                start_frame: 0,
                number_of_packets: 0,
                interval: 0,
                setup: [0; SETUP_LEN],
            }),
        };
        assert!(is_response_poll(&poll.encode()));

        // OUT direction is not a poll
        let mut out = poll;
        out.base.direction = DIR_OUT;
        assert!(!is_response_poll(&out.encode()));

        // A submit with trailing payload is not a poll
        let mut with_payload = poll.encode().to_vec();
        with_payload.extend_from_slice(&[0u8; 4]);
        assert!(!is_response_poll(&with_payload));
    }
}
