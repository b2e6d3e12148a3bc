//! USBIP wire protocol for the usbip-dap probe server
//!
//! This crate defines the on-wire formats spoken by the server: the USBIP
//! stage-1 (device discovery and attach) and stage-2 (URB submit/unlink)
//! sub-protocols, plus the direct-link handshake used by the alternative
//! attach path. Everything here is fixed-layout big-endian encoding with
//! explicit per-field codecs; there is no I/O in this crate.
//!
//! # Example
//!
//! ```
//! use protocol::stage2::{UrbHeader, UrbRequest};
//!
//! let mut wire = [0u8; 48];
//! wire[3] = 1; // CMD_SUBMIT
//! let header = UrbHeader::decode(&wire).unwrap();
//! assert!(matches!(header.request, UrbRequest::Submit(_)));
//! ```

pub mod direct_link;
pub mod error;
pub mod stage1;
pub mod stage2;

pub use direct_link::{Detection, HandshakeRequest};
pub use error::{ProtocolError, Result};
pub use stage1::{DeviceRecord, InterfaceRecord, Stage1Header, read_stage1_command};
pub use stage2::{UrbBase, UrbHeader, UrbRequest, is_response_poll};
