//! Packet pipeline between the network task and the command executor
//!
//! Two bounded FIFO queues connect the socket-facing session to the
//! execution task: inbound carries tunneled command packets, outbound
//! carries the executor's responses. A channel send doubles as the wake
//! signal for the execution loop, and a single-slot mailbox delivers
//! restart signals that only the execution task may act on.
//!
//! The pending-response counter tracks responses produced but not yet
//! delivered to the wire. Its mutex is the sole lock in the system. The
//! unlink mitigation assumes at most one undelivered response exists at a
//! time; that single-in-flight contract comes from the host driver's own
//! one-request-one-wait usage and is deliberately not generalized here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_channel::{Receiver, Sender, bounded};
use common::{Error, Result, TransportMode};
use tracing::{debug, error, info, warn};

use crate::executor::CommandExecutor;

/// Command-stream opcode asking the device to queue commands for later
pub const QUEUE_COMMANDS_OPCODE: u8 = 0x06;
/// Command-stream opcode executing commands immediately
pub const EXECUTE_COMMANDS_OPCODE: u8 = 0x05;

/// How long the execution loop waits for work before rechecking signals
const WAKE_TIMEOUT: Duration = Duration::from_millis(100);
/// Short bounded wait for outbound dequeues (fast reply, unlink drain)
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(10);

/// One queued command or response packet
///
/// The buffer is always allocated at the transport's fixed packet size;
/// `len` is the meaningful byte count, which equals the full size when the
/// transport has no length framing.
#[derive(Debug)]
pub struct DapPacket {
    pub buf: Box<[u8]>,
    pub len: usize,
}

impl DapPacket {
    /// Copy a raw payload into a fixed-size packet for the given mode
    ///
    /// Oversized payloads are truncated to the packet size; short payloads
    /// are zero padded.
    pub fn from_payload(mode: TransportMode, payload: &[u8]) -> Self {
        let size = mode.packet_size();
        let mut buf = vec![0u8; size].into_boxed_slice();
        let n = payload.len().min(size);
        buf[..n].copy_from_slice(&payload[..n]);
        Self { buf, len: n }
    }

    /// The meaningful bytes of this packet
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len.min(self.buf.len())]
    }
}

/// Restart signals, consumed only by the execution task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartSignal {
    /// Drain and deactivate both queues; used when the session switches to
    /// the direct-link protocol, which does not use this pipeline
    TearDown,
    /// Drain and reactivate, guaranteeing a clean pipeline for the next
    /// session after a TCP disconnect
    Reset,
}

/// Outcome of a response poll on behalf of the fast-reply path
#[derive(Debug)]
pub enum PollOutcome {
    /// A processed response was pending and has been dequeued
    Response(DapPacket),
    /// Nothing pending; the caller answers with an empty success reply
    Empty,
}

/// The packet pipeline and its lifecycle state
///
/// Owned as an `Arc` by the connection-accept loop and the execution task;
/// all methods take `&self`.
pub struct Pipeline {
    mode: TransportMode,
    inbound_tx: Sender<DapPacket>,
    inbound_rx: Receiver<DapPacket>,
    outbound_tx: Sender<DapPacket>,
    outbound_rx: Receiver<DapPacket>,
    /// Processed-but-unsent response count; invariant 0..=queue depth
    pending: Mutex<u32>,
    signal_tx: Sender<RestartSignal>,
    signal_rx: Receiver<RestartSignal>,
    active: AtomicBool,
}

impl Pipeline {
    /// Create a pipeline with both queues sized to `depth` slots
    pub fn new(mode: TransportMode, depth: usize) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = bounded(depth);
        let (outbound_tx, outbound_rx) = bounded(depth);
        let (signal_tx, signal_rx) = bounded(1);
        Arc::new(Self {
            mode,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
            pending: Mutex::new(0),
            signal_tx,
            signal_rx,
            active: AtomicBool::new(true),
        })
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Responses processed but not yet delivered
    pub fn pending(&self) -> u32 {
        *self.pending.lock().unwrap()
    }

    /// False after a TearDown until the next Reset
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of command packets waiting for the execution task
    pub fn inbound_len(&self) -> usize {
        self.inbound_rx.len()
    }

    /// Enqueue one tunneled command packet and wake the execution task
    ///
    /// Never blocks the network task: a full queue is reported as an error
    /// and the packet dropped (the client's own pacing prevents this in
    /// steady state).
    pub fn submit_inbound(&self, payload: &[u8]) -> Result<()> {
        self.enqueue(DapPacket::from_payload(self.mode, payload))
    }

    /// Enqueue an already-framed packet
    pub fn enqueue(&self, packet: DapPacket) -> Result<()> {
        if !self.is_active() {
            return Err(Error::Channel("pipeline is torn down".into()));
        }
        self.inbound_tx
            .try_send(packet)
            .map_err(|_| Error::Channel("inbound queue full".into()))
    }

    /// Post a restart signal for the execution task
    ///
    /// The mailbox holds one slot; a newer signal replaces an unconsumed
    /// stale one. The channel send is also the wake, so a Reset issued
    /// with nothing queued is still observed promptly.
    pub fn signal(&self, signal: RestartSignal) {
        if self.signal_tx.try_send(signal).is_err() {
            let _ = self.signal_rx.try_recv();
            let _ = self.signal_tx.try_send(signal);
        }
    }

    /// Dequeue one pending response for the fast-reply path
    ///
    /// Returns `Empty` without touching the outbound queue when the
    /// pending counter is zero; that is the latency-critical common case.
    pub async fn poll_response(&self) -> PollOutcome {
        if self.pending() == 0 {
            return PollOutcome::Empty;
        }
        match tokio::time::timeout(DEQUEUE_TIMEOUT, self.outbound_rx.recv()).await {
            Ok(Ok(packet)) => {
                *self.pending.lock().unwrap() -= 1;
                PollOutcome::Response(packet)
            }
            _ => {
                // Counted but not yet visible in the queue; answer empty
                // and let the host poll again.
                warn!("pending response not dequeued within the bounded wait");
                PollOutcome::Empty
            }
        }
    }

    /// Unlink-race mitigation: discard at most one stale response
    ///
    /// A host-issued UNLINK can race with a response the executor already
    /// produced. Draining one outbound item keeps that stale response from
    /// answering a later, unrelated request. Best effort by contract.
    pub async fn discard_stale_response(&self) {
        if self.pending() == 0 {
            return;
        }
        if let Ok(Ok(packet)) = tokio::time::timeout(DEQUEUE_TIMEOUT, self.outbound_rx.recv()).await
        {
            *self.pending.lock().unwrap() -= 1;
            debug!("discarded stale response of {} bytes", packet.len);
        }
    }

    fn apply_signal(&self, signal: RestartSignal) {
        // Exclusive drain: the counter mutex gates queue teardown so a
        // concurrent poll cannot observe a half-reset pipeline.
        let mut pending = self.pending.lock().unwrap();
        while self.inbound_rx.try_recv().is_ok() {}
        while self.outbound_rx.try_recv().is_ok() {}
        *pending = 0;
        match signal {
            RestartSignal::TearDown => {
                info!("pipeline torn down");
                self.active.store(false, Ordering::Release);
            }
            RestartSignal::Reset => {
                info!("pipeline reset");
                self.active.store(true, Ordering::Release);
            }
        }
    }

    /// The execution task: consume inbound, run the executor, produce
    /// outbound
    ///
    /// Runs until the pipeline's channels are gone, which is the only
    /// unrecoverable state; per the error-handling design that halts this
    /// task, not the process.
    pub async fn run<E: CommandExecutor>(self: Arc<Self>, mut executor: E) -> Result<()> {
        info!("command execution task started");
        loop {
            while let Ok(signal) = self.signal_rx.try_recv() {
                self.apply_signal(signal);
            }

            let item = tokio::select! {
                signal = self.signal_rx.recv() => {
                    match signal {
                        Ok(signal) => {
                            self.apply_signal(signal);
                            continue;
                        }
                        Err(_) => {
                            error!("signal mailbox closed; halting execution task");
                            return Err(Error::Channel("signal mailbox closed".into()));
                        }
                    }
                }
                received = tokio::time::timeout(WAKE_TIMEOUT, self.inbound_rx.recv()) => {
                    match received {
                        Err(_) => continue, // timed out; recheck signals
                        Ok(Err(_)) => {
                            error!("inbound queue closed; halting execution task");
                            return Err(Error::Channel("inbound queue closed".into()));
                        }
                        Ok(Ok(item)) => item,
                    }
                }
            };

            let size = self.mode.packet_size();
            if item.buf.len() < size {
                // Framing underrun; release the slot, produce no response.
                warn!(
                    "short packet from inbound queue: {} of {} bytes",
                    item.buf.len(),
                    size
                );
                continue;
            }

            let mut request = item.buf;
            // The tunnel collapses the firmware's queue-then-execute
            // batching into immediate execution.
            if request[0] == QUEUE_COMMANDS_OPCODE {
                request[0] = EXECUTE_COMMANDS_OPCODE;
            }

            let mut response = vec![0u8; size].into_boxed_slice();
            let result = executor.process_command(&request, &mut response);
            let response_len = (result & 0xFFFF) as usize;

            let len = if self.mode.has_length_prefix() {
                response_len.min(size)
            } else {
                size
            };

            // Blocking send: back-pressure keeps the executor from racing
            // ahead of unconsumed responses.
            if self
                .outbound_tx
                .send(DapPacket { buf: response, len })
                .await
                .is_err()
            {
                error!("outbound queue closed; halting execution task");
                return Err(Error::Channel("outbound queue closed".into()));
            }
            *self.pending.lock().unwrap() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::DAP_QUEUE_DEPTH;

    #[test]
    fn test_packet_pads_and_truncates() {
        let packet = DapPacket::from_payload(TransportMode::WinUsb, &[1, 2, 3]);
        assert_eq!(packet.buf.len(), 512);
        assert_eq!(packet.data(), &[1, 2, 3]);
        assert_eq!(packet.buf[3], 0);

        let oversized = vec![0xAA; 600];
        let packet = DapPacket::from_payload(TransportMode::WinUsb, &oversized);
        assert_eq!(packet.len, 512);
    }

    #[test]
    fn test_submit_inbound_bounded() {
        let pipeline = Pipeline::new(TransportMode::WinUsb, 2);
        assert!(pipeline.submit_inbound(&[1]).is_ok());
        assert!(pipeline.submit_inbound(&[2]).is_ok());
        // Third slot does not exist; the send must not block.
        assert!(pipeline.submit_inbound(&[3]).is_err());
        assert_eq!(pipeline.inbound_len(), 2);
    }

    #[test]
    fn test_signal_mailbox_replaces_stale() {
        let pipeline = Pipeline::new(TransportMode::WinUsb, DAP_QUEUE_DEPTH);
        pipeline.signal(RestartSignal::TearDown);
        pipeline.signal(RestartSignal::Reset);
        assert!(matches!(
            pipeline.signal_rx.try_recv(),
            Ok(RestartSignal::Reset)
        ));
        assert!(pipeline.signal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_response_empty_without_queue_access() {
        let pipeline = Pipeline::new(TransportMode::WinUsb, DAP_QUEUE_DEPTH);
        assert!(matches!(pipeline.poll_response().await, PollOutcome::Empty));
        assert_eq!(pipeline.pending(), 0);
    }
}
