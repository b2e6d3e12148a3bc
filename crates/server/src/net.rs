//! TCP listener and receive loop
//!
//! One listener on the fixed port, one accepted connection served at a
//! time; keep-alive and no-delay are set on the listening socket and on
//! every accepted socket. Each connection gets a fresh session; on
//! disconnect the session's teardown guarantees a clean pipeline for the
//! next client.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::BytesMut;
use common::config::TCP_RX_BUFFER_LEN;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;
use crate::session::Session;

/// Bind the listening socket with keep-alive and no-delay enabled
pub fn bind(port: u16) -> Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .context("unable to create socket")?;
    socket.set_keepalive(true).context("SO_KEEPALIVE failed")?;
    socket.set_nodelay(true).context("TCP_NODELAY failed")?;
    socket
        .set_reuse_address(true)
        .context("SO_REUSEADDR failed")?;

    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
    socket
        .bind(&addr.into())
        .with_context(|| format!("unable to bind port {}", port))?;
    // Single-client design: a backlog of one.
    socket.listen(1).context("listen failed")?;
    socket
        .set_nonblocking(true)
        .context("set_nonblocking failed")?;

    TcpListener::from_std(socket.into()).context("listener registration failed")
}

/// Accept loop: serve one connection at a time, forever
pub async fn serve(listener: TcpListener, pipeline: Arc<Pipeline>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        if let Err(e) = configure_stream(&stream) {
            warn!("socket option setup failed for {}: {:#}", peer, e);
        }
        info!("accepted connection from {}", peer);
        serve_connection(stream, pipeline.clone()).await;
    }
}

/// Bind and serve on the given port
pub async fn run(port: u16, pipeline: Arc<Pipeline>) -> Result<()> {
    let listener = bind(port)?;
    info!("listening on port {}", port);
    serve(listener, pipeline).await
}

fn configure_stream(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true).context("TCP_NODELAY failed")?;
    SockRef::from(stream)
        .set_keepalive(true)
        .context("SO_KEEPALIVE failed")?;
    Ok(())
}

/// Receive loop for one accepted connection
async fn serve_connection(stream: TcpStream, pipeline: Arc<Pipeline>) {
    let (mut reader, writer) = stream.into_split();
    let mut session = Session::new(writer, pipeline);
    let mut buf = BytesMut::with_capacity(TCP_RX_BUFFER_LEN);

    loop {
        buf.clear();
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                info!("connection closed");
                break;
            }
            Ok(_) => {
                if let Err(e) = session.handle_chunk(&buf).await {
                    error!("session error: {:#}", e);
                    break;
                }
            }
            Err(e) => {
                warn!("recv failed: {}", e);
                break;
            }
        }
    }

    info!("shutting down socket and restarting");
    session.disconnect();
}
