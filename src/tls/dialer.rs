//! Connection establishment and the protected stream.
//!
//! `FingerprintDialer` opens the TCP connection, drives the four-flight
//! TLS 1.1 handshake, and hands back a `TlsStream` carrying RC4/HMAC
//! record protection in both directions.

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::crypto::{
    finished_verify_data, MasterSecret, PremasterSecret, RecordCipher, SecureRandom, SessionKeys,
    VERIFY_DATA_SIZE,
};
use crate::error::{Error, Result};
use crate::tls::hello::{
    handshake_message, parse_leaf_certificate, read_u24, ClientHelloBuilder, ContentType,
    HandshakeType, ServerHello,
};
use crate::tls::{CIPHER_RC4_128_SHA, MAX_FRAGMENT_LEN, MAX_RECORD_LEN, TLS_VERSION};

/// Dials gateway connections carrying the pinned hello fingerprint.
pub struct FingerprintDialer {
    handshake_timeout: Duration,
    insecure_skip_verify: bool,
}

impl FingerprintDialer {
    /// Create a dialer.
    ///
    /// `insecure_skip_verify` is the explicit trust-bypass switch: the
    /// gateway presents a certificate chain that no root store can
    /// verify, so chain and hostname validation are skipped entirely
    /// when it is set. Dialing fails at the certificate stage when it
    /// is not.
    pub fn new(handshake_timeout_ms: u64, insecure_skip_verify: bool) -> Self {
        Self {
            handshake_timeout: Duration::from_millis(handshake_timeout_ms),
            insecure_skip_verify,
        }
    }

    /// Connect to the gateway and complete the TLS handshake.
    ///
    /// TCP connect and the handshake share one `handshake_timeout`
    /// deadline.
    pub async fn dial(&self, host: &str, port: u16) -> Result<TlsStream<TcpStream>> {
        let addr = format!("{}:{}", host, port);

        timeout(self.handshake_timeout, async {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| Error::dial(format!("{}: {}", addr, e)))?;
            stream.set_nodelay(true)?;
            self.establish(stream).await
        })
        .await
        .map_err(|_| Error::Timeout(self.handshake_timeout.as_millis() as u64))?
    }

    /// Run the TLS handshake over an already-connected byte stream.
    ///
    /// Generic over the stream so the handshake can be exercised against
    /// an in-memory peer; `dial` wraps this with the TCP connect and the
    /// handshake timeout.
    pub async fn establish<S>(&self, mut stream: S) -> Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut transcript: Vec<u8> = Vec::new();

        // Flight 1: the pinned ClientHello
        let hello = ClientHelloBuilder::new();
        let hello_record = hello.build();
        transcript.extend_from_slice(&hello_record[5..]);
        stream.write_all(&hello_record).await?;

        // Flight 2: ServerHello, Certificate, ServerHelloDone. Messages
        // may be coalesced into one record or split across several.
        let mut reader = HandshakeReader::new();

        let msg = reader.next_message(&mut stream).await?;
        if msg[0] != HandshakeType::ServerHello as u8 {
            return Err(Error::tls(format!(
                "expected ServerHello, got handshake type {}",
                msg[0]
            )));
        }
        let server_hello = ServerHello::parse(&msg[4..])?;
        if server_hello.cipher_suite != CIPHER_RC4_128_SHA {
            return Err(Error::tls(format!(
                "gateway selected unsupported cipher suite {:#06x}",
                server_hello.cipher_suite
            )));
        }
        if server_hello.compression != 0 {
            return Err(Error::tls("gateway selected non-null compression"));
        }
        transcript.extend_from_slice(&msg);

        let msg = reader.next_message(&mut stream).await?;
        if msg[0] != HandshakeType::Certificate as u8 {
            return Err(Error::tls(format!(
                "expected Certificate, got handshake type {}",
                msg[0]
            )));
        }
        // Trust bypass: the chain is unverifiable by design, so the only
        // check offered is the operator's explicit acknowledgement. The
        // leaf is still parsed because its key drives the key transport.
        if !self.insecure_skip_verify {
            return Err(Error::certificate(
                "gateway chain cannot be verified; set insecure_skip_verify to acknowledge the trust bypass",
            ));
        }
        let leaf = parse_leaf_certificate(&msg[4..])?;
        let public_key = extract_rsa_public_key(&leaf)?;
        transcript.extend_from_slice(&msg);

        let msg = reader.next_message(&mut stream).await?;
        if msg[0] != HandshakeType::ServerHelloDone as u8 {
            return Err(Error::tls(format!(
                "expected ServerHelloDone, got handshake type {}",
                msg[0]
            )));
        }
        transcript.extend_from_slice(&msg);

        // Flight 3: ClientKeyExchange, ChangeCipherSpec, Finished
        let premaster = PremasterSecret::generate();
        let encrypted = public_key
            .encrypt(&mut SecureRandom::rng(), Pkcs1v15Encrypt, premaster.as_bytes())
            .map_err(|e| Error::tls(format!("premaster encryption failed: {}", e)))?;
        let mut cke_body = Vec::with_capacity(2 + encrypted.len());
        cke_body.extend_from_slice(&(encrypted.len() as u16).to_be_bytes());
        cke_body.extend_from_slice(&encrypted);
        let cke = handshake_message(HandshakeType::ClientKeyExchange, &cke_body);
        transcript.extend_from_slice(&cke);

        let master = MasterSecret::derive(
            &premaster,
            hello.client_random(),
            &server_hello.server_random,
        );
        let keys = SessionKeys::derive(&master, hello.client_random(), &server_hello.server_random);
        let mut write_cipher = RecordCipher::new(keys.client());
        let mut read_cipher = RecordCipher::new(keys.server());

        let verify = finished_verify_data(master.as_bytes(), b"client finished", &transcript);
        let finished = handshake_message(HandshakeType::Finished, &verify);
        transcript.extend_from_slice(&finished);

        let mut flight = frame_record(ContentType::Handshake as u8, &cke);
        flight.extend_from_slice(&frame_record(ContentType::ChangeCipherSpec as u8, &[1]));
        let protected = write_cipher.protect(ContentType::Handshake as u8, &finished);
        flight.extend_from_slice(&frame_record(ContentType::Handshake as u8, &protected));
        stream.write_all(&flight).await?;

        // Flight 4: server ChangeCipherSpec, then its Finished under the
        // fresh keys.
        if !reader.is_empty() {
            return Err(Error::tls("stray handshake bytes before ChangeCipherSpec"));
        }
        let (content_type, payload) = read_record(&mut stream).await?;
        if content_type == ContentType::Alert as u8 {
            return Err(alert_error(&payload));
        }
        if content_type != ContentType::ChangeCipherSpec as u8 || payload != [1] {
            return Err(Error::tls("expected ChangeCipherSpec from gateway"));
        }

        let (content_type, payload) = read_record(&mut stream).await?;
        if content_type != ContentType::Handshake as u8 {
            return Err(Error::tls("expected Finished from gateway"));
        }
        let plain = read_cipher.deprotect(content_type, &payload)?;
        if plain.len() != 4 + VERIFY_DATA_SIZE
            || plain[0] != HandshakeType::Finished as u8
            || read_u24(&plain[1..4]) != VERIFY_DATA_SIZE
        {
            return Err(Error::tls("malformed Finished from gateway"));
        }
        let expected = finished_verify_data(master.as_bytes(), b"server finished", &transcript);
        let mismatch = expected
            .iter()
            .zip(&plain[4..])
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if mismatch != 0 {
            return Err(Error::tls("gateway Finished verification failed"));
        }

        debug!("TLS handshake complete, record protection active");

        Ok(TlsStream {
            stream,
            read_cipher,
            write_cipher,
        })
    }
}

/// An established, record-protected connection to the gateway.
pub struct TlsStream<S> {
    stream: S,
    read_cipher: RecordCipher,
    write_cipher: RecordCipher,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TlsStream<S> {
    /// Send one payload as a single protected application-data record.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FRAGMENT_LEN {
            return Err(Error::tls(format!(
                "payload of {} bytes exceeds one record",
                data.len()
            )));
        }
        let protected = self
            .write_cipher
            .protect(ContentType::ApplicationData as u8, data);
        let record = frame_record(ContentType::ApplicationData as u8, &protected);
        self.stream.write_all(&record).await?;
        Ok(())
    }

    /// Receive one record's plaintext.
    ///
    /// A close_notify alert from the gateway surfaces as an
    /// `UnexpectedEof` I/O error, the same shape a hard TCP close
    /// produces, so callers have a single end-of-channel path. Any
    /// other alert is a protocol error.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        let (content_type, payload) = read_record(&mut self.stream).await?;
        if content_type == ContentType::ApplicationData as u8 {
            return self.read_cipher.deprotect(content_type, &payload);
        }
        if content_type == ContentType::Alert as u8 {
            let alert = self.read_cipher.deprotect(content_type, &payload)?;
            // description 0 is close_notify, the orderly shutdown
            if alert.len() == 2 && alert[1] == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "gateway closed the channel",
                )));
            }
            return Err(alert_error(&alert));
        }
        Err(Error::tls(format!(
            "unexpected record type {:#04x}",
            content_type
        )))
    }

    /// Close the connection, sending a best-effort close_notify alert.
    pub async fn close(mut self) -> Result<()> {
        let protected = self.write_cipher.protect(ContentType::Alert as u8, &[1, 0]);
        let record = frame_record(ContentType::Alert as u8, &protected);
        let _ = self.stream.write_all(&record).await;
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_parts(stream: S, read_cipher: RecordCipher, write_cipher: RecordCipher) -> Self {
        Self {
            stream,
            read_cipher,
            write_cipher,
        }
    }
}

// Opaque: the cipher states are key material
impl<S> fmt::Debug for TlsStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsStream").finish_non_exhaustive()
    }
}

/// Buffers handshake bytes so messages can be reassembled across record
/// boundaries.
struct HandshakeReader {
    buf: BytesMut,
}

impl HandshakeReader {
    fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pull the next complete handshake message, header included.
    async fn next_message<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<Vec<u8>> {
        while self.buf.len() < 4 {
            self.fill(stream).await?;
        }
        let body_len = read_u24(&self.buf[1..4]);
        if body_len > 4 * MAX_RECORD_LEN {
            return Err(Error::tls("handshake message too large"));
        }
        while self.buf.len() < 4 + body_len {
            self.fill(stream).await?;
        }
        Ok(self.buf.split_to(4 + body_len).to_vec())
    }

    async fn fill<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        let (content_type, payload) = read_record(stream).await?;
        if content_type == ContentType::Alert as u8 {
            return Err(alert_error(&payload));
        }
        if content_type != ContentType::Handshake as u8 {
            return Err(Error::tls(format!(
                "unexpected record type {:#04x} during handshake",
                content_type
            )));
        }
        self.buf.extend_from_slice(&payload);
        Ok(())
    }
}

/// Read one TLS record, returning its content type and payload.
async fn read_record<S: AsyncRead + Unpin>(stream: &mut S) -> Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await?;

    // Accept any 3.x record version; the hello pins the protocol version
    // and some stacks stamp records with 3.0 or 3.1.
    if header[1] != 0x03 {
        return Err(Error::tls(format!(
            "not a TLS record (version byte {:#04x})",
            header[1]
        )));
    }
    let len = u16::from_be_bytes([header[3], header[4]]) as usize;
    if len > MAX_RECORD_LEN {
        return Err(Error::tls(format!("record length {} exceeds limit", len)));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok((header[0], payload))
}

/// Prefix a payload with the 5-byte record header.
fn frame_record(content_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(5 + payload.len());
    record.push(content_type);
    record.extend_from_slice(&TLS_VERSION);
    record.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    record.extend_from_slice(payload);
    record
}

fn alert_error(payload: &[u8]) -> Error {
    if payload.len() >= 2 {
        Error::tls(format!(
            "gateway sent alert, level {} description {}",
            payload[0], payload[1]
        ))
    } else {
        Error::tls("gateway sent malformed alert")
    }
}

fn extract_rsa_public_key(der: &[u8]) -> Result<RsaPublicKey> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| Error::certificate(format!("malformed gateway certificate: {}", e)))?;
    RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| Error::certificate(format!("gateway key is not RSA: {}", e)))
}
