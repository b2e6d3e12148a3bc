//! usbip-dap server
//!
//! A TCP server that lets a remote debug-probe client drive a debug access
//! port over the network. The server emulates a single USB probe device
//! behind the USBIP protocol; command packets tunneled in endpoint-1 URBs
//! flow through a bounded packet pipeline to an opaque command executor.
//! A lighter direct-link attach protocol is sniffed on the same port.
//!
//! Two tasks cooperate per the single-probe design: the network task owns
//! the socket and the session state machine, the execution task owns the
//! consume-inbound / produce-outbound loop. The pipeline's queues and its
//! pending-response counter are the only state shared between them.

pub mod attach;
pub mod control;
pub mod direct_link;
pub mod emulate;
pub mod executor;
pub mod net;
pub mod pipeline;
pub mod session;
pub mod trace;

pub use control::{AckControl, ControlHandler, ControlReply};
pub use direct_link::{DirectLinkHandler, DirectLinkProbe, NullDirectLinkHandler};
pub use executor::{CommandExecutor, LoopbackExecutor};
pub use pipeline::{DapPacket, Pipeline, PollOutcome, RestartSignal};
pub use session::{ProtocolProbe, Session, SessionState};
pub use trace::TraceSlot;
