//! Packet forwarding between the virtual interface and the channels.
//!
//! Two loops run concurrently once negotiation finishes. Each owns its
//! direction outright, so no locking is involved:
//!
//! ```text
//!   receive channel --recv_loop--> virtual interface
//!   virtual interface --send_loop--> send channel
//! ```
//!
//! Packets cross verbatim. The only filtering is the send-side IPv6
//! drop; the session is negotiated for IPv4 only.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::tls::TlsStream;
use crate::{RECV_BUFFER_SIZE, SEND_BUFFER_SIZE};

/// Copy gateway records to the virtual interface.
///
/// Each received record is written to the interface as one packet, in
/// one write, unmodified. Returns `Ok(())` when the gateway ends the
/// channel; any other error is fatal to the task and propagates to the
/// supervisor.
pub async fn recv_loop<S, W>(mut channel: TlsStream<S>, mut interface: W) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let packet = match channel.recv().await {
            Ok(p) => p,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("receive channel closed by gateway");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if packet.is_empty() {
            continue;
        }
        if packet.len() > RECV_BUFFER_SIZE {
            return Err(Error::frame(format!(
                "gateway packet of {} bytes exceeds the interface MTU",
                packet.len()
            )));
        }

        debug!(len = packet.len(), "tunnel -> interface");
        interface.write_all(&packet).await?;
        interface.flush().await?;
    }
}

/// Copy interface packets to the send channel.
///
/// IPv6 packets are dropped silently; everything else goes out verbatim
/// as one record per packet. Returns `Ok(())` when the interface
/// reaches end of stream; errors are fatal to the task.
pub async fn send_loop<S, R>(mut interface: R, mut channel: TlsStream<S>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; SEND_BUFFER_SIZE];
    loop {
        let n = interface.read(&mut buf).await?;
        if n == 0 {
            debug!("virtual interface closed");
            return Ok(());
        }

        // IP version lives in the high nibble of the first byte
        if buf[0] >> 4 == 0x6 {
            debug!(len = n, "dropping IPv6 packet");
            continue;
        }

        debug!(len = n, "interface -> tunnel");
        channel.send(&buf[..n]).await?;
    }
}
