//! USBIP stage-1 handling: device list and device attach
//!
//! The server exports exactly one device, so both replies are fixed:
//! the device list declares one device with one interface, and an attach
//! echoes the device record and moves the session into emulation. All
//! sends are sequential writes on the session's socket.

use anyhow::{Context, Result};
use common::descriptor;
use protocol::stage1::{
    self, BUSID_LEN, CMD_DEVICE_ATTACH, CMD_DEVICE_LIST, STAGE1_HEADER_LEN, Stage1Header,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::session::{Session, SessionState};

/// Route a stage-1 request
///
/// Framing errors and unknown commands are logged and dropped; the
/// connection stays open and the client sees a stalled request.
pub(crate) async fn attach<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    buf: &[u8],
) -> Result<()> {
    let command = match stage1::read_stage1_command(buf) {
        Ok(command) => command,
        Err(e) => {
            warn!("stage-1 request rejected: {}", e);
            return Ok(());
        }
    };

    match command {
        CMD_DEVICE_LIST => handle_device_list(session).await,
        CMD_DEVICE_ATTACH => handle_device_attach(session, buf).await,
        other => {
            warn!("attach: unknown stage-1 command {:#x}", other);
            Ok(())
        }
    }
}

/// Reply to a device-list request
///
/// Wire order: header, list size (always 1), device record, interface
/// record.
async fn handle_device_list<W: AsyncWrite + Unpin + Send>(session: &mut Session<W>) -> Result<()> {
    debug!("handling device list request");

    let header = Stage1Header::reply(CMD_DEVICE_LIST).encode();
    session
        .writer
        .write_all(&header)
        .await
        .context("device list header send failed")?;

    session
        .writer
        .write_all(&stage1::encode_device_count(1))
        .await
        .context("device list size send failed")?;

    session
        .writer
        .write_all(&descriptor::device_record().encode())
        .await
        .context("device record send failed")?;

    session
        .writer
        .write_all(&descriptor::interface_record().encode())
        .await
        .context("interface record send failed")?;

    Ok(())
}

/// Reply to a device-attach request and enter emulation
async fn handle_device_attach<W: AsyncWrite + Unpin + Send>(
    session: &mut Session<W>,
    buf: &[u8],
) -> Result<()> {
    debug!("handling device attach request");

    // The request carries the requested bus id after the header.
    if buf.len() < STAGE1_HEADER_LEN + BUSID_LEN {
        warn!("device attach request too short: {} bytes", buf.len());
        return Ok(());
    }

    let header = Stage1Header::reply(CMD_DEVICE_ATTACH).encode();
    session
        .writer
        .write_all(&header)
        .await
        .context("attach header send failed")?;

    session
        .writer
        .write_all(&descriptor::device_record().encode())
        .await
        .context("attach device record send failed")?;

    session.set_state(SessionState::Emulating);
    info!("device attached, session emulating");
    Ok(())
}
