//! TLS 1.1 record protection for the pinned stream-cipher suite.
//!
//! One `RecordCipher` per direction. The RC4 keystream is continuous
//! across records, so records must be protected and deprotected strictly
//! in wire order. The MAC covers an implicit 64-bit sequence number that
//! starts at zero when the direction activates at ChangeCipherSpec.

use hmac::{Hmac, Mac};
use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};
use sha1::Sha1;

use crate::crypto::{DirectionKeys, MAC_SIZE};
use crate::error::{Error, Result};

/// Record version bytes covered by the MAC (TLS 1.1).
const RECORD_VERSION: [u8; 2] = [0x03, 0x02];

/// Protects or unprotects records flowing in one direction.
pub struct RecordCipher {
    cipher: Rc4<U16>,
    mac_key: [u8; MAC_SIZE],
    seq: u64,
}

impl RecordCipher {
    /// Create a cipher for one direction from its key block slice.
    pub fn new(keys: &DirectionKeys) -> Self {
        let cipher: Rc4<U16> = Rc4::new((&keys.cipher_key).into());
        Self {
            cipher,
            mac_key: keys.mac_key,
            seq: 0,
        }
    }

    /// Protect one record fragment: append the MAC, then encrypt both.
    ///
    /// Returns the ciphertext to place after the record header. The
    /// caller keeps fragments within the record-size cap; length bytes
    /// in the MAC cover the plaintext fragment only.
    pub fn protect(&mut self, content_type: u8, fragment: &[u8]) -> Vec<u8> {
        let tag = self.compute_mac(content_type, fragment);

        let mut buf = Vec::with_capacity(fragment.len() + MAC_SIZE);
        buf.extend_from_slice(fragment);
        buf.extend_from_slice(&tag);
        self.cipher.apply_keystream(&mut buf);
        self.seq += 1;
        buf
    }

    /// Decrypt one record and verify its MAC.
    ///
    /// # Errors
    ///
    /// Returns a TLS error if the record is shorter than a MAC or the
    /// MAC does not verify (tampering, wrong keys, or out-of-order
    /// processing desynchronizing the keystream).
    pub fn deprotect(&mut self, content_type: u8, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < MAC_SIZE {
            return Err(Error::tls("record shorter than its MAC"));
        }

        let mut buf = ciphertext.to_vec();
        self.cipher.apply_keystream(&mut buf);

        let split = buf.len() - MAC_SIZE;
        let expected = self.compute_mac(content_type, &buf[..split]);

        // Constant-time comparison
        let mismatch = expected
            .iter()
            .zip(&buf[split..])
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if mismatch != 0 {
            return Err(Error::tls("record MAC verification failed"));
        }

        self.seq += 1;
        buf.truncate(split);
        Ok(buf)
    }

    fn compute_mac(&self, content_type: u8, fragment: &[u8]) -> [u8; MAC_SIZE] {
        // Fully qualified: KeyInit (for Rc4) also offers new_from_slice
        let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(&self.mac_key)
            .expect("HMAC can take key of any size");
        mac.update(&self.seq.to_be_bytes());
        mac.update(&[content_type]);
        mac.update(&RECORD_VERSION);
        mac.update(&(fragment.len() as u16).to_be_bytes());
        mac.update(fragment);
        mac.finalize().into_bytes().into()
    }
}
