//! # l3tun
//!
//! Client for a proprietary SSL-VPN tunneling protocol that hides VPN
//! traffic inside deliberately non-standard TLS connections on the same
//! port as HTTPS.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │           Virtual Interface (TUN, raw IPv4 packets)       │
//! ├───────────────────────────────────────────────────────────┤
//! │  Forwarders (receive channel → TUN, TUN → send channel)   │
//! ├───────────────────────────────────────────────────────────┤
//! │  Session Negotiation (address query, channel handshakes)  │
//! ├───────────────────────────────────────────────────────────┤
//! │  Frame Codec (64-byte handshake frames, ack validation)   │
//! ├───────────────────────────────────────────────────────────┤
//! │  Fingerprint TLS 1.1 (RSA key transport, RC4-128, SHA1)   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway multiplexes VPN and HTTPS on one port and routes each
//! connection on its client hello fingerprint: protocol version pinned to
//! TLS 1.1, exactly two cipher suites, a magic session identifier. Any
//! deviation lands on the HTTPS handler instead. Each channel role
//! (query, receive, send) gets one dedicated connection for the life of
//! the session; after negotiation, raw IP packets ride the record layer
//! verbatim.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod tls;
pub mod tun;
pub mod tunnel;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use tunnel::session::{SessionChannels, SessionNegotiator};

/// Session token length in bytes, fixed by the gateway protocol
pub const TOKEN_LEN: usize = 48;

/// Length of every channel handshake frame on the wire
pub const FRAME_LEN: usize = 64;

/// Maximum plaintext accepted from the receive channel per read
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Read buffer for packets captured off the virtual interface
pub const SEND_BUFFER_SIZE: usize = 2000;

/// Default timeout for handshake operations (milliseconds)
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
