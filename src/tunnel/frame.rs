//! Fixed-layout negotiation frames.
//!
//! Every handshake message is exactly 64 bytes, little-endian tag first:
//!
//! ```text
//!   offset   0        4                52          60       64
//!            +--------+----------------+-----------+--------+
//!   request  | tag LE | session token  | reserved  | trailer|
//!            +--------+----------------+-----------+--------+
//!
//!   tag 0x00 query      trailer = FF FF FF FF        ack 0x00
//!   tag 0x06 receive    trailer = reversed client IP ack 0x01
//!   tag 0x05 send       trailer = reversed client IP ack 0x02
//!   tag 0x03 heartbeat  reserved runs to the end, no trailer
//! ```
//!
//! Responses open with the ack byte; the query response additionally
//! carries the assigned address in bytes 4..8, in normal order.

use crate::error::{Error, Result};
use crate::{FRAME_LEN, RECV_BUFFER_SIZE, TOKEN_LEN};

/// Request tag for the address query channel.
pub const TAG_QUERY: u32 = 0x0000_0000;
/// Request tag for the heartbeat frame.
pub const TAG_HEARTBEAT: u32 = 0x0000_0003;
/// Request tag for the send channel.
pub const TAG_SEND: u32 = 0x0000_0005;
/// Request tag for the receive channel.
pub const TAG_RECEIVE: u32 = 0x0000_0006;

const TOKEN_END: usize = 4 + TOKEN_LEN;
const TRAILER_START: usize = FRAME_LEN - 4;

/// The role a negotiated connection plays for the session.
///
/// Each role maps to one dedicated connection, one request tag, and one
/// expected acknowledgement byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Address query; the connection is closed once the IP is extracted.
    Query,
    /// Gateway-to-client packet stream.
    Receive,
    /// Client-to-gateway packet stream.
    Send,
}

impl ChannelRole {
    /// Tag carried in the first four bytes of the request frame.
    pub fn request_tag(self) -> u32 {
        match self {
            ChannelRole::Query => TAG_QUERY,
            ChannelRole::Receive => TAG_RECEIVE,
            ChannelRole::Send => TAG_SEND,
        }
    }

    /// Acknowledgement byte the gateway answers with on success.
    pub fn expected_ack(self) -> u8 {
        match self {
            ChannelRole::Query => 0x00,
            ChannelRole::Receive => 0x01,
            ChannelRole::Send => 0x02,
        }
    }
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Query => write!(f, "query"),
            ChannelRole::Receive => write!(f, "receive"),
            ChannelRole::Send => write!(f, "send"),
        }
    }
}

/// Build the 64-byte handshake request for a role.
///
/// `client_ip` must already be byte-reversed; the query role ignores it
/// and carries the fixed `FF FF FF FF` trailer instead.
pub fn encode_request(
    role: ChannelRole,
    token: &[u8; TOKEN_LEN],
    client_ip: [u8; 4],
) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&role.request_tag().to_le_bytes());
    frame[4..TOKEN_END].copy_from_slice(token);
    // bytes 52..60 are reserved and stay zero
    let trailer = match role {
        ChannelRole::Query => [0xFF; 4],
        ChannelRole::Receive | ChannelRole::Send => client_ip,
    };
    frame[TRAILER_START..].copy_from_slice(&trailer);
    frame
}

/// Build the 64-byte heartbeat frame.
///
/// The wire protocol defines this frame but the negotiated channels are
/// never observed to need it; nothing in the client transmits it yet.
pub fn encode_heartbeat(token: &[u8; TOKEN_LEN]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&TAG_HEARTBEAT.to_le_bytes());
    frame[4..TOKEN_END].copy_from_slice(token);
    frame
}

/// Decode a request frame back into its role, token, and trailer.
pub fn decode_request(frame: &[u8]) -> Result<(ChannelRole, [u8; TOKEN_LEN], [u8; 4])> {
    if frame.len() != FRAME_LEN {
        return Err(Error::frame(format!(
            "request frame must be {} bytes, got {}",
            FRAME_LEN,
            frame.len()
        )));
    }
    let tag = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let role = match tag {
        TAG_QUERY => ChannelRole::Query,
        TAG_RECEIVE => ChannelRole::Receive,
        TAG_SEND => ChannelRole::Send,
        other => {
            return Err(Error::frame(format!("unknown request tag {:#010x}", other)));
        }
    };
    let mut token = [0u8; TOKEN_LEN];
    token.copy_from_slice(&frame[4..TOKEN_END]);
    let mut trailer = [0u8; 4];
    trailer.copy_from_slice(&frame[TRAILER_START..]);
    Ok((role, token, trailer))
}

/// Validate the acknowledgement byte of a handshake response.
///
/// A mismatch means the connection was routed to the wrong handler or
/// the token was refused; the connection is considered corrupted and is
/// never retried.
pub fn check_ack(role: ChannelRole, response: &[u8]) -> Result<()> {
    if response.is_empty() {
        return Err(Error::frame("empty handshake response"));
    }
    if response.len() > RECV_BUFFER_SIZE {
        return Err(Error::frame(format!(
            "handshake response of {} bytes exceeds the ack buffer",
            response.len()
        )));
    }
    let expected = role.expected_ack();
    let actual = response[0];
    if actual != expected {
        return Err(Error::ProtocolMismatch { expected, actual });
    }
    Ok(())
}

/// Extract the assigned address from a query response.
///
/// The address arrives in normal byte order; callers reverse it with
/// [`reverse_ip`] before putting it in later handshake frames.
pub fn query_assigned_ip(response: &[u8]) -> Result<[u8; 4]> {
    check_ack(ChannelRole::Query, response)?;
    // the reply fits one request-sized frame
    if response.len() < 8 || response.len() > FRAME_LEN {
        return Err(Error::frame(format!(
            "query response must be 8..={} bytes, got {}",
            FRAME_LEN,
            response.len()
        )));
    }
    let mut ip = [0u8; 4];
    ip.copy_from_slice(&response[4..8]);
    Ok(ip)
}

/// Swap a 4-byte address end for end, the order the gateway expects in
/// handshake trailers. Applying it twice restores the original.
pub fn reverse_ip(ip: [u8; 4]) -> [u8; 4] {
    [ip[3], ip[2], ip[1], ip[0]]
}
