//! Three-channel session negotiation.
//!
//! A session is built from three dedicated TLS connections, opened in
//! order:
//!
//! ```text
//!   query    --- address query ----> ack 0x00 + assigned IP, closed
//!   receive  --- receive handshake -> ack 0x01, kept for streaming
//!   send     --- send handshake ----> ack 0x02, kept for streaming
//! ```
//!
//! The query must finish first: both streaming handshakes carry the
//! assigned address, byte-reversed, in their trailer. The negotiator
//! returns the two established channels and the address; it holds no
//! state of its own afterwards.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::tls::{FingerprintDialer, TlsStream};
use crate::tunnel::frame::{self, ChannelRole};
use crate::TOKEN_LEN;

/// Lifecycle of one negotiated connection.
///
/// `Failed` is terminal: an ack mismatch or I/O error during
/// negotiation is fatal for session establishment, with no automatic
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No transport connection yet.
    Disconnected,
    /// TCP is up, the TLS handshake is running.
    TlsHandshaking,
    /// The role's request frame has been sent, awaiting the ack.
    HandshakeSent,
    /// Ack validated; the connection now carries streaming data only.
    Established,
    /// Deliberately shut down, as the query connection is after use.
    Closed,
    /// Negotiation error; the connection is abandoned.
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::TlsHandshaking => "tls-handshaking",
            ChannelState::HandshakeSent => "handshake-sent",
            ChannelState::Established => "established",
            ChannelState::Closed => "closed",
            ChannelState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a negotiated session consists of.
///
/// The forwarding tasks consume the two channels independently; the
/// token never leaves the negotiator.
pub struct SessionChannels {
    /// Address assigned by the gateway, in normal byte order.
    pub assigned_ip: [u8; 4],
    /// Gateway-to-client packet stream.
    pub receive: TlsStream<TcpStream>,
    /// Client-to-gateway packet stream.
    pub send: TlsStream<TcpStream>,
}

impl fmt::Debug for SessionChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionChannels")
            .field("assigned_ip", &self.assigned_ip)
            .finish_non_exhaustive()
    }
}

/// Drives the three channel handshakes against one gateway.
pub struct SessionNegotiator {
    host: String,
    port: u16,
    token: Zeroizing<[u8; TOKEN_LEN]>,
    dialer: FingerprintDialer,
    handshake_timeout: Duration,
}

impl SessionNegotiator {
    /// Build a negotiator from the client configuration.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            host: config.server_host.clone(),
            port: config.server_port,
            token: Zeroizing::new(config.session_token),
            dialer: FingerprintDialer::new(
                config.handshake_timeout_ms,
                config.insecure_skip_verify,
            ),
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
        }
    }

    /// Negotiate a full session: resolve the client address, then
    /// establish the receive and send channels.
    pub async fn negotiate(&self) -> Result<SessionChannels> {
        info!(server = %self.host, port = self.port, "negotiating session");

        let (query, response) = self
            .establish_channel(ChannelRole::Query, [0; 4])
            .await?;
        let assigned_ip = frame::query_assigned_ip(&response)?;
        let reversed_ip = frame::reverse_ip(assigned_ip);
        query.close().await?;
        debug!(role = %ChannelRole::Query, state = %ChannelState::Closed, "query connection released");
        info!(ip = %Ipv4Addr::from(assigned_ip), "gateway assigned address");

        let (receive, _) = self
            .establish_channel(ChannelRole::Receive, reversed_ip)
            .await?;
        let (send, _) = self
            .establish_channel(ChannelRole::Send, reversed_ip)
            .await?;

        Ok(SessionChannels {
            assigned_ip,
            receive,
            send,
        })
    }

    /// Open one connection, run its role handshake, and report the final
    /// channel state.
    async fn establish_channel(
        &self,
        role: ChannelRole,
        client_ip: [u8; 4],
    ) -> Result<(TlsStream<TcpStream>, Vec<u8>)> {
        let mut state = ChannelState::Disconnected;
        let result = self.run_channel(role, client_ip, &mut state).await;
        match &result {
            Ok(_) => debug!(%role, state = %state, "channel ready"),
            Err(e) => {
                state = ChannelState::Failed;
                warn!(%role, state = %state, error = %e, "channel negotiation failed");
            }
        }
        result
    }

    async fn run_channel(
        &self,
        role: ChannelRole,
        client_ip: [u8; 4],
        state: &mut ChannelState,
    ) -> Result<(TlsStream<TcpStream>, Vec<u8>)> {
        *state = ChannelState::TlsHandshaking;
        let mut stream = self.dialer.dial(&self.host, self.port).await?;

        // The gateway must ack within the same budget the dial gets
        let response = timeout(
            self.handshake_timeout,
            exchange_handshake(&mut stream, role, &self.token, client_ip, state),
        )
        .await
        .map_err(|_| Error::Timeout(self.handshake_timeout.as_millis() as u64))??;
        *state = ChannelState::Established;
        Ok((stream, response))
    }
}

/// Send a role's request frame and validate the gateway's ack.
async fn exchange_handshake<S>(
    stream: &mut TlsStream<S>,
    role: ChannelRole,
    token: &[u8; TOKEN_LEN],
    client_ip: [u8; 4],
    state: &mut ChannelState,
) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = frame::encode_request(role, token, client_ip);
    stream.send(&request).await?;
    *state = ChannelState::HandshakeSent;

    let response = stream.recv().await?;
    frame::check_ack(role, &response)?;
    Ok(response)
}
