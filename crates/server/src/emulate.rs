//! USBIP stage-2 emulation: URB submit and unlink
//!
//! Every stage-2 message is tried against the fast-reply shape first; the
//! general path decodes the URB header and dispatches by endpoint and
//! direction. Endpoint 1 tunnels the command stream through the packet
//! pipeline, endpoint 2 serves trace data, endpoint 0 delegates to the
//! control boundary.

use anyhow::{Context, Result};
use protocol::ProtocolError;
use protocol::stage2::{
    self, DIR_IN, DIR_OUT, SubmitRequest, URB_HEADER_LEN, UrbBase, UrbHeader, UrbRequest,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::control::ControlReply;
use crate::pipeline::PollOutcome;
use crate::session::Session;

/// RET_UNLINK status; the peer only checks for non-zero
const UNLINK_ACK_STATUS: i32 = -1;

/// Handle one stage-2 message
pub(crate) async fn emulate<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    buf: &[u8],
) -> Result<()> {
    if fast_reply(session, buf).await? {
        return Ok(());
    }

    let header = match UrbHeader::decode(buf) {
        Ok(header) => header,
        Err(e) => {
            warn!("stage-2 request rejected: {}", e);
            return Ok(());
        }
    };

    match header.request {
        UrbRequest::Submit(submit) => handle_submit(session, &header.base, &submit, buf).await,
        UrbRequest::Unlink(_) => handle_unlink(session, &header.base).await,
    }
}

/// Latency-critical short circuit for the host's response poll
///
/// Only the bare 48-byte endpoint-1 IN submit qualifies. With a pending
/// response the reply goes out as one write of header plus payload; with
/// none, a synthesized empty success, with no outbound-queue access.
async fn fast_reply<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    buf: &[u8],
) -> Result<bool> {
    if !stage2::is_response_poll(buf) {
        return Ok(false);
    }
    // Shape check passed, so this decode cannot fail on length or command.
    let header = UrbHeader::decode(buf).context("response poll failed to decode")?;

    match session.pipeline.poll_response().await {
        PollOutcome::Response(packet) => {
            send_submit_reply_fast(session, &header.base, 0, packet.data()).await?;
        }
        PollOutcome::Empty => {
            send_submit_reply(session, &header.base, 0, &[]).await?;
        }
    }
    Ok(true)
}

/// Dispatch a submit request by endpoint and direction
async fn handle_submit<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    base: &UrbBase,
    submit: &SubmitRequest,
    buf: &[u8],
) -> Result<()> {
    let payload = &buf[URB_HEADER_LEN.min(buf.len())..];

    match (base.ep, base.direction) {
        // Control endpoint: enumeration traffic, delegated.
        (0, _) => {
            let reply = session.control.handle(&submit.setup, payload);
            match reply {
                ControlReply::Ack => send_submit_reply(session, base, 0, &[]).await,
                ControlReply::Data(data) => send_submit_reply(session, base, 0, &data).await,
            }
        }

        // Endpoint 1 OUT: a tunneled command packet.
        (1, DIR_OUT) => {
            send_submit_reply(session, base, 0, &[]).await?;
            if let Err(e) = session.pipeline.submit_inbound(payload) {
                warn!("command packet dropped: {}", e);
            }
            Ok(())
        }

        // Endpoint 1 IN: response poll that missed the fast-reply shape
        // (extra payload bytes). Fast reply owns the real path; this
        // fallback just acknowledges empty.
        (1, DIR_IN) => send_submit_reply(session, base, 0, &[]).await,

        // Endpoint 2 OUT: trace configuration data, acknowledged empty.
        (2, DIR_OUT) => send_submit_reply(session, base, 0, &[]).await,

        // Endpoint 2 IN: deliver the pending trace buffer, if any.
        (2, DIR_IN) => match session.trace.take() {
            Some(data) => send_submit_reply(session, base, 0, &data).await,
            None => send_submit_reply(session, base, 0, &[]).await,
        },

        (ep, _) => {
            warn!("submit rejected: {}", ProtocolError::UnknownEndpoint(ep));
            Ok(())
        }
    }
}

/// Unlink: mitigate the in-flight response race, then acknowledge
async fn handle_unlink<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    base: &UrbBase,
) -> Result<()> {
    debug!("handling cmd unlink");
    session.pipeline.discard_stale_response().await;

    let reply = stage2::encode_unlink_reply(base, UNLINK_ACK_STATUS);
    session
        .writer
        .write_all(&reply)
        .await
        .context("unlink reply send failed")?;
    Ok(())
}

/// Send a submit reply: header write, then payload write when present
pub(crate) async fn send_submit_reply<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    base: &UrbBase,
    status: i32,
    data: &[u8],
) -> Result<()> {
    let header = stage2::encode_submit_reply(base, status, data.len() as i32);
    session
        .writer
        .write_all(&header)
        .await
        .context("submit reply header send failed")?;
    if !data.is_empty() {
        session
            .writer
            .write_all(data)
            .await
            .context("submit reply payload send failed")?;
    }
    Ok(())
}

/// Single-write submit reply for the fast path
async fn send_submit_reply_fast<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    base: &UrbBase,
    status: i32,
    data: &[u8],
) -> Result<()> {
    let header = stage2::encode_submit_reply(base, status, data.len() as i32);
    let mut frame = Vec::with_capacity(URB_HEADER_LEN + data.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(data);
    session
        .writer
        .write_all(&frame)
        .await
        .context("fast submit reply send failed")?;
    Ok(())
}
