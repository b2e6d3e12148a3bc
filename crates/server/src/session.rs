//! Per-connection session state machine
//!
//! One session exists per accepted TCP connection; it owns the socket's
//! write half and routes every inbound byte chunk by its current state.
//! The attach phase sniffs protocols: the listener cannot know which
//! client is connecting, so an ordered list of detectors is run against
//! each chunk and the first acceptor wins, with USBIP attach as the
//! fallback.

use std::sync::Arc;

use anyhow::{Context, Result};
use protocol::direct_link::{Detection, decode_handshake, encode_handshake_response};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::attach;
use crate::control::{AckControl, ControlHandler};
use crate::direct_link::{DirectLinkHandler, DirectLinkProbe, NullDirectLinkHandler};
use crate::emulate;
use crate::pipeline::{Pipeline, RestartSignal};
use crate::trace::TraceSlot;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fresh connection, no bytes seen yet
    Accepting,
    /// Protocol sniffing and USBIP stage-1
    Attaching,
    /// USBIP stage-2 URB traffic
    Emulating,
    /// Direct-link data phase, for the rest of the connection
    DirectLinkData,
}

/// Candidate protocol detector run against the first bytes of a
/// connection
///
/// Detectors are consulted by reference while the session future is
/// parked on a write, so they must be shareable across threads.
pub trait ProtocolProbe: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, buf: &[u8]) -> Detection;
}

/// State and collaborators for one accepted connection
pub struct Session<W> {
    state: SessionState,
    pub(crate) writer: W,
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) trace: TraceSlot,
    pub(crate) control: Box<dyn ControlHandler>,
    link: Box<dyn DirectLinkHandler>,
    probes: Vec<Box<dyn ProtocolProbe>>,
    /// Attach-phase bytes held while a detector verdict is deferred
    held: Vec<u8>,
}

impl<W: AsyncWrite + Unpin + Send> Session<W> {
    /// Create a session with the default handler boundaries
    pub fn new(writer: W, pipeline: Arc<Pipeline>) -> Self {
        Self {
            state: SessionState::Accepting,
            writer,
            pipeline,
            trace: TraceSlot::new(),
            control: Box::new(AckControl),
            link: Box::new(NullDirectLinkHandler),
            probes: vec![Box::new(DirectLinkProbe)],
            held: Vec::new(),
        }
    }

    /// Swap in a real control-request handler
    pub fn set_control_handler(&mut self, control: Box<dyn ControlHandler>) {
        self.control = control;
    }

    /// Swap in a real direct-link data-phase handler
    pub fn set_direct_link_handler(&mut self, link: Box<dyn DirectLinkHandler>) {
        self.link = link;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        debug!("session state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Access to the trace slot so a capture source can queue buffers
    pub fn trace(&self) -> &TraceSlot {
        &self.trace
    }

    /// Route one received byte chunk by the current state
    pub async fn handle_chunk(&mut self, buf: &[u8]) -> Result<()> {
        match self.state {
            SessionState::Accepting => {
                self.set_state(SessionState::Attaching);
                self.attaching(buf).await
            }
            SessionState::Attaching => self.attaching(buf).await,
            SessionState::Emulating => emulate::emulate(self, buf).await,
            SessionState::DirectLinkData => {
                if let Some(reply) = self.link.process(buf) {
                    self.writer
                        .write_all(&reply)
                        .await
                        .context("direct-link reply send failed")?;
                }
                Ok(())
            }
        }
    }

    /// Attach phase: run the detector list, fall back to USBIP
    ///
    /// Detectors always judge the connection's initial byte prefix, so a
    /// chunk arriving while a verdict is deferred is appended to the held
    /// bytes rather than evaluated on its own. The prefix stays bounded:
    /// a verdict lands as soon as twelve bytes are in hand.
    async fn attaching(&mut self, buf: &[u8]) -> Result<()> {
        let mut held = std::mem::take(&mut self.held);
        let buf: &[u8] = if held.is_empty() {
            buf
        } else {
            held.extend_from_slice(buf);
            &held
        };

        for probe in &self.probes {
            match probe.detect(buf) {
                Detection::Accept => {
                    info!("{} handshake accepted", probe.name());
                    return self.complete_direct_link(buf).await;
                }
                Detection::NeedMoreData => {
                    debug!(
                        "{} needs more data, holding {} bytes",
                        probe.name(),
                        buf.len()
                    );
                    self.held = buf.to_vec();
                    return Ok(());
                }
                Detection::Reject => {}
            }
        }
        attach::attach(self, buf).await
    }

    async fn complete_direct_link(&mut self, buf: &[u8]) -> Result<()> {
        let request = decode_handshake(buf).context("accepted handshake failed to decode")?;
        debug!("direct-link proxy version {}", request.proxy_version);

        let packet_size = self.pipeline.mode().packet_size() as u32;
        let response = encode_handshake_response(packet_size);
        self.writer
            .write_all(&response)
            .await
            .context("handshake response send failed")?;

        // The direct-link data phase bypasses the URB pipeline entirely.
        self.pipeline.signal(RestartSignal::TearDown);
        self.set_state(SessionState::DirectLinkData);
        Ok(())
    }

    /// Teardown on socket close or error
    ///
    /// Frees direct-link resources and guarantees a clean pipeline for the
    /// next connection.
    pub fn disconnect(&mut self) {
        if matches!(
            self.state,
            SessionState::Emulating | SessionState::DirectLinkData
        ) {
            self.state = SessionState::Accepting;
        } else if self.state != SessionState::Accepting {
            warn!("disconnect during attach phase");
            self.state = SessionState::Accepting;
        }
        self.held.clear();
        self.link.reset();
        self.pipeline.signal(RestartSignal::Reset);
    }
}
