//! Fingerprint-pinned TLS 1.1 client.
//!
//! The gateway multiplexes VPN and HTTPS traffic on one port and routes a
//! connection to the VPN handler only when the client hello carries an
//! exact anomalous shape: protocol version pinned to TLS 1.1, precisely
//! two cipher suites (RC4-128-SHA plus the empty-renegotiation-info
//! signaling value), the null compression method, and a 32-byte session
//! identifier whose first four bytes are a magic tag. Anything else lands
//! on the HTTPS handler or is rejected outright.
//!
//! ## Handshake Flow
//!
//! ```text
//! Client                                   Gateway
//!   |                                         |
//!   |  ClientHello (pinned fingerprint)       |
//!   |---------------------------------------->|
//!   |        ServerHello + Certificate        |
//!   |            + ServerHelloDone            |
//!   |<----------------------------------------|
//!   |                                         |
//!   |  ClientKeyExchange (RSA premaster)      |
//!   |  ChangeCipherSpec                       |
//!   |  Finished (first protected record)      |
//!   |---------------------------------------->|
//!   |  ChangeCipherSpec + Finished            |
//!   |<----------------------------------------|
//!   |                                         |
//!   |===== RC4/HMAC-SHA1 protected data =====|
//! ```
//!
//! No standard TLS stack still negotiates this suite, so the handshake,
//! key schedule, and record layer are implemented directly for the one
//! pinned configuration.

mod dialer;
mod hello;

pub use dialer::{FingerprintDialer, TlsStream};
pub use hello::{handshake_message, ClientHelloBuilder, ContentType, HandshakeType, ServerHello};

/// Magic prefix of the session identifier that routes to the VPN handler
pub const SESSION_MAGIC: [u8; 4] = *b"L3IP";

/// Fixed session identifier length (magic plus zero padding)
pub const SESSION_ID_LEN: usize = 32;

/// The pinned protocol version, TLS 1.1, offered as both floor and ceiling
pub const TLS_VERSION: [u8; 2] = [0x03, 0x02];

/// TLS_RSA_WITH_RC4_128_SHA, the only real suite offered
pub const CIPHER_RC4_128_SHA: u16 = 0x0005;

/// TLS_EMPTY_RENEGOTIATION_INFO_SCSV, the second (signaling-only) entry
pub const CIPHER_EMPTY_RENEGOTIATION_SCSV: u16 = 0x00ff;

/// Upper bound on record payloads accepted off the wire
pub const MAX_RECORD_LEN: usize = 16384 + 256;

/// Largest plaintext fragment placed in one outgoing record
pub const MAX_FRAGMENT_LEN: usize = 16384;
