//! Control-request boundary (endpoint 0)
//!
//! Control transfers carry the emulated device's enumeration traffic. The
//! full control-request machinery lives outside this core; the emulator
//! only dispatches to this trait. The default implementation acknowledges
//! every request with an empty success reply, which is enough to keep an
//! already-attached host driver satisfied.

/// Reply decision for a control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    /// Empty success acknowledgement
    Ack,
    /// Success with response payload (IN data stage)
    Data(Vec<u8>),
}

/// Handles endpoint-0 control requests
pub trait ControlHandler: Send {
    /// Decide the reply for one control request
    ///
    /// `setup` is the raw 8-byte USB SETUP packet from the URB header;
    /// `payload` is the OUT data stage, when present.
    fn handle(&mut self, setup: &[u8; 8], payload: &[u8]) -> ControlReply;
}

/// Default handler: acknowledge everything
#[derive(Debug, Default)]
pub struct AckControl;

impl ControlHandler for AckControl {
    fn handle(&mut self, _setup: &[u8; 8], _payload: &[u8]) -> ControlReply {
        ControlReply::Ack
    }
}
