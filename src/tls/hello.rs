//! TLS 1.1 handshake message construction and parsing.
//!
//! Builds the byte-exact anomalous ClientHello the gateway fingerprints
//! on, and parses the server's reply flight. Only the shapes this one
//! pinned configuration can produce are handled.

use bytes::{BufMut, BytesMut};

use crate::crypto::{SecureRandom, RANDOM_SIZE};
use crate::error::{Error, Result};
use crate::tls::{
    CIPHER_EMPTY_RENEGOTIATION_SCSV, CIPHER_RC4_128_SHA, SESSION_ID_LEN, SESSION_MAGIC,
    TLS_VERSION,
};

/// TLS record types
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContentType {
    /// change_cipher_spec
    ChangeCipherSpec = 20,
    /// alert
    Alert = 21,
    /// handshake
    Handshake = 22,
    /// application_data
    ApplicationData = 23,
}

/// TLS handshake message types
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HandshakeType {
    /// client_hello
    ClientHello = 1,
    /// server_hello
    ServerHello = 2,
    /// certificate
    Certificate = 11,
    /// server_hello_done
    ServerHelloDone = 14,
    /// client_key_exchange
    ClientKeyExchange = 16,
    /// finished
    Finished = 20,
}

/// Builder for the fingerprint-pinned ClientHello.
///
/// Every field except the client random is a constant of the protocol:
/// the gateway routes on the exact shape, so nothing here is negotiable.
pub struct ClientHelloBuilder {
    client_random: [u8; RANDOM_SIZE],
}

impl ClientHelloBuilder {
    /// Create a builder with a fresh client random.
    pub fn new() -> Self {
        Self {
            client_random: SecureRandom::bytes(),
        }
    }

    /// The client random carried in the hello, needed later for the key
    /// schedule.
    pub fn client_random(&self) -> &[u8; RANDOM_SIZE] {
        &self.client_random
    }

    /// Build the complete ClientHello record.
    pub fn build(&self) -> Vec<u8> {
        let body = self.build_client_hello_body();

        let mut buf = BytesMut::with_capacity(5 + body.len());
        buf.put_u8(ContentType::Handshake as u8);
        buf.put_slice(&TLS_VERSION);
        buf.put_u16(body.len() as u16);
        buf.put_slice(&body);
        buf.to_vec()
    }

    fn build_client_hello_body(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(96);

        // Handshake type and length placeholder
        buf.put_u8(HandshakeType::ClientHello as u8);
        let length_pos = buf.len();
        buf.put_slice(&[0, 0, 0]); // 3-byte length placeholder

        // Pinned client version, both minimum and maximum offered
        buf.put_slice(&TLS_VERSION);

        // Client random
        buf.put_slice(&self.client_random);

        // Session identifier: magic tag followed by zero padding
        buf.put_u8(SESSION_ID_LEN as u8);
        buf.put_slice(&SESSION_MAGIC);
        buf.put_bytes(0, SESSION_ID_LEN - SESSION_MAGIC.len());

        // Exactly two cipher suites
        buf.put_u16(4);
        buf.put_u16(CIPHER_RC4_128_SHA);
        buf.put_u16(CIPHER_EMPTY_RENEGOTIATION_SCSV);

        // Single null compression method
        buf.put_u8(1);
        buf.put_u8(0);

        // No extensions block at all; the field is absent in the
        // old-style hello the gateway expects.

        // Fill in handshake length
        let total_len = buf.len() - 4;
        buf[length_pos] = ((total_len >> 16) & 0xff) as u8;
        buf[length_pos + 1] = ((total_len >> 8) & 0xff) as u8;
        buf[length_pos + 2] = (total_len & 0xff) as u8;

        buf.to_vec()
    }
}

impl Default for ClientHelloBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a handshake body in its 4-byte message header.
pub fn handshake_message(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4 + body.len());
    buf.put_u8(msg_type as u8);
    buf.put_u8(((body.len() >> 16) & 0xff) as u8);
    buf.put_u8(((body.len() >> 8) & 0xff) as u8);
    buf.put_u8((body.len() & 0xff) as u8);
    buf.put_slice(body);
    buf.to_vec()
}

/// Read a 3-byte big-endian length.
pub(crate) fn read_u24(b: &[u8]) -> usize {
    ((b[0] as usize) << 16) | ((b[1] as usize) << 8) | (b[2] as usize)
}

/// Parsed ServerHello fields the client acts on.
#[derive(Debug)]
pub struct ServerHello {
    /// Server random (32 bytes)
    pub server_random: [u8; RANDOM_SIZE],
    /// Selected cipher suite
    pub cipher_suite: u16,
    /// Selected compression method
    pub compression: u8,
}

impl ServerHello {
    /// Parse a ServerHello body (the bytes after the 4-byte message
    /// header).
    ///
    /// Trailing extensions (the server may echo renegotiation info in
    /// response to the SCSV) are tolerated and ignored.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < 2 + RANDOM_SIZE + 1 {
            return Err(Error::tls("ServerHello body too short"));
        }

        if body[0] != TLS_VERSION[0] || body[1] != TLS_VERSION[1] {
            return Err(Error::tls(format!(
                "gateway negotiated version {:#04x}.{:#04x}, expected TLS 1.1",
                body[0], body[1]
            )));
        }

        let mut server_random = [0u8; RANDOM_SIZE];
        server_random.copy_from_slice(&body[2..2 + RANDOM_SIZE]);

        let session_id_len = body[2 + RANDOM_SIZE] as usize;
        if session_id_len > 32 {
            return Err(Error::tls("ServerHello session id too long"));
        }

        let pos = 2 + RANDOM_SIZE + 1 + session_id_len;
        if body.len() < pos + 3 {
            return Err(Error::tls("ServerHello truncated"));
        }

        let cipher_suite = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let compression = body[pos + 2];

        Ok(Self {
            server_random,
            cipher_suite,
            compression,
        })
    }
}

/// Extract the leaf (first) certificate from a Certificate message body.
///
/// The body is a 3-byte chain length followed by length-prefixed DER
/// entries; only the leaf carries the key used for the RSA key
/// transport.
pub fn parse_leaf_certificate(body: &[u8]) -> Result<Vec<u8>> {
    if body.len() < 3 {
        return Err(Error::tls("Certificate message too short"));
    }
    let chain_len = read_u24(&body[..3]);
    if body.len() < 3 + chain_len {
        return Err(Error::tls("Certificate chain truncated"));
    }

    let chain = &body[3..3 + chain_len];
    if chain.len() < 3 {
        return Err(Error::tls("empty certificate chain"));
    }
    let leaf_len = read_u24(&chain[..3]);
    if chain.len() < 3 + leaf_len {
        return Err(Error::tls("leaf certificate truncated"));
    }

    Ok(chain[3..3 + leaf_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_hello_record_shape() {
        let builder = ClientHelloBuilder::new();
        let hello = builder.build();

        // Record header: handshake, TLS 1.1, fixed body length
        assert_eq!(hello[0], ContentType::Handshake as u8);
        assert_eq!(&hello[1..3], &TLS_VERSION);
        let record_len = u16::from_be_bytes([hello[3], hello[4]]) as usize;
        assert_eq!(hello.len(), 5 + record_len);

        // Handshake header
        assert_eq!(hello[5], HandshakeType::ClientHello as u8);
        assert_eq!(read_u24(&hello[6..9]), record_len - 4);

        // Pinned client version inside the body as well
        assert_eq!(&hello[9..11], &TLS_VERSION);
    }

    #[test]
    fn test_client_hello_session_id_magic() {
        let builder = ClientHelloBuilder::new();
        let hello = builder.build();

        // Session id sits after version (2) + random (32)
        let sid_len_at = 5 + 4 + 2 + RANDOM_SIZE;
        assert_eq!(hello[sid_len_at] as usize, SESSION_ID_LEN);
        let sid = &hello[sid_len_at + 1..sid_len_at + 1 + SESSION_ID_LEN];
        assert_eq!(&sid[..4], &SESSION_MAGIC);
        assert!(sid[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_client_hello_suites_and_compression() {
        let hello = ClientHelloBuilder::new().build();

        let suites_at = 5 + 4 + 2 + RANDOM_SIZE + 1 + SESSION_ID_LEN;
        let suites_len = u16::from_be_bytes([hello[suites_at], hello[suites_at + 1]]) as usize;
        // Exactly two suites, in this order
        assert_eq!(suites_len, 4);
        assert_eq!(
            u16::from_be_bytes([hello[suites_at + 2], hello[suites_at + 3]]),
            CIPHER_RC4_128_SHA
        );
        assert_eq!(
            u16::from_be_bytes([hello[suites_at + 4], hello[suites_at + 5]]),
            CIPHER_EMPTY_RENEGOTIATION_SCSV
        );

        // Single null compression method, then nothing: no extensions
        let comp_at = suites_at + 2 + suites_len;
        assert_eq!(hello[comp_at], 1);
        assert_eq!(hello[comp_at + 1], 0);
        assert_eq!(hello.len(), comp_at + 2);
    }

    #[test]
    fn test_client_hello_random_varies() {
        let a = ClientHelloBuilder::new();
        let b = ClientHelloBuilder::new();
        assert_ne!(a.client_random(), b.client_random());

        // The random must appear verbatim in the built hello
        let hello = a.build();
        assert_eq!(&hello[11..11 + RANDOM_SIZE], a.client_random());
    }

    #[test]
    fn test_server_hello_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(&TLS_VERSION);
        body.extend_from_slice(&[0x42u8; RANDOM_SIZE]);
        body.push(0); // empty session id
        body.extend_from_slice(&CIPHER_RC4_128_SHA.to_be_bytes());
        body.push(0); // null compression
                      // renegotiation info extension, tolerated and ignored
        body.extend_from_slice(&[0x00, 0x05, 0xff, 0x01, 0x00, 0x01, 0x00]);

        let parsed = ServerHello::parse(&body).unwrap();
        assert_eq!(parsed.server_random, [0x42u8; RANDOM_SIZE]);
        assert_eq!(parsed.cipher_suite, CIPHER_RC4_128_SHA);
        assert_eq!(parsed.compression, 0);
    }

    #[test]
    fn test_server_hello_rejects_other_versions() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x03, 0x03]); // TLS 1.2
        body.extend_from_slice(&[0u8; RANDOM_SIZE]);
        body.push(0);
        body.extend_from_slice(&CIPHER_RC4_128_SHA.to_be_bytes());
        body.push(0);

        assert!(ServerHello::parse(&body).is_err());
    }

    #[test]
    fn test_leaf_certificate_extraction() {
        let leaf = b"fake der certificate";
        let second = b"issuer";

        let mut body = Vec::new();
        let chain_len = 3 + leaf.len() + 3 + second.len();
        body.extend_from_slice(&[0, 0, chain_len as u8]);
        body.extend_from_slice(&[0, 0, leaf.len() as u8]);
        body.extend_from_slice(leaf);
        body.extend_from_slice(&[0, 0, second.len() as u8]);
        body.extend_from_slice(second);

        let extracted = parse_leaf_certificate(&body).unwrap();
        assert_eq!(extracted, leaf);
    }

    #[test]
    fn test_leaf_certificate_truncated() {
        // Chain claims more bytes than the message carries
        let body = [0x00, 0x00, 0x10, 0x00, 0x00, 0x08, 0x01, 0x02];
        assert!(parse_leaf_certificate(&body).is_err());
    }

    #[test]
    fn test_handshake_message_framing() {
        let msg = handshake_message(HandshakeType::Finished, &[0xaa; 12]);
        assert_eq!(msg[0], HandshakeType::Finished as u8);
        assert_eq!(read_u24(&msg[1..4]), 12);
        assert_eq!(msg.len(), 16);
    }
}
