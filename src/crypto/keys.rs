//! Secrets and the RC4_128_SHA key block.
//!
//! Type-safe wrappers for the premaster and master secrets and the
//! per-direction record keys derived from them. All secret material is
//! zeroized on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::prf::prf;
use crate::crypto::{SecureRandom, CIPHER_KEY_SIZE, MAC_SIZE, MASTER_SECRET_SIZE, RANDOM_SIZE};

/// Offered protocol version, repeated in the premaster secret.
///
/// The gateway pins TLS 1.1 ({3, 2}) as both minimum and maximum; the
/// premaster must echo the version the hello offered or the key
/// transport is rejected.
pub const PREMASTER_VERSION: [u8; 2] = [0x03, 0x02];

/// The 48-byte premaster secret sent under RSA key transport.
///
/// Layout: 2 version bytes followed by 46 random bytes. Generated fresh
/// per connection and zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PremasterSecret([u8; MASTER_SECRET_SIZE]);

impl PremasterSecret {
    /// Generate a fresh premaster secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; MASTER_SECRET_SIZE];
        bytes[..2].copy_from_slice(&PREMASTER_VERSION);
        SecureRandom::fill(&mut bytes[2..]);
        Self(bytes)
    }

    /// Create from raw bytes (server side of the key transport).
    pub fn from_bytes(bytes: [u8; MASTER_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw secret bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this is secret key material.
    pub fn as_bytes(&self) -> &[u8; MASTER_SECRET_SIZE] {
        &self.0
    }
}

/// The 48-byte master secret.
///
/// Derived once per connection; feeds the key block and both Finished
/// verify_data computations.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; MASTER_SECRET_SIZE]);

impl MasterSecret {
    /// Derive the master secret from the premaster and both hello randoms.
    pub fn derive(
        premaster: &PremasterSecret,
        client_random: &[u8; RANDOM_SIZE],
        server_random: &[u8; RANDOM_SIZE],
    ) -> Self {
        let mut seed = [0u8; RANDOM_SIZE * 2];
        seed[..RANDOM_SIZE].copy_from_slice(client_random);
        seed[RANDOM_SIZE..].copy_from_slice(server_random);

        let out = prf(
            premaster.as_bytes(),
            b"master secret",
            &seed,
            MASTER_SECRET_SIZE,
        );
        let mut bytes = [0u8; MASTER_SECRET_SIZE];
        bytes.copy_from_slice(&out);
        Self(bytes)
    }

    /// Get the raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; MASTER_SECRET_SIZE] {
        &self.0
    }
}

/// Record keys for one direction: MAC key then cipher key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DirectionKeys {
    /// HMAC-SHA1 key for the record MAC
    pub mac_key: [u8; MAC_SIZE],
    /// RC4-128 cipher key
    pub cipher_key: [u8; CIPHER_KEY_SIZE],
}

/// The full key block for the session, partitioned per direction.
///
/// RC4_128_SHA uses no IVs, so the block is exactly two MAC keys
/// followed by two cipher keys: client_mac, server_mac, client_key,
/// server_key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    client: DirectionKeys,
    server: DirectionKeys,
}

impl SessionKeys {
    /// Derive the key block from the master secret and both randoms.
    ///
    /// Note the seed order flips relative to the master secret
    /// derivation: server_random comes first here.
    pub fn derive(
        master: &MasterSecret,
        client_random: &[u8; RANDOM_SIZE],
        server_random: &[u8; RANDOM_SIZE],
    ) -> Self {
        let mut seed = [0u8; RANDOM_SIZE * 2];
        seed[..RANDOM_SIZE].copy_from_slice(server_random);
        seed[RANDOM_SIZE..].copy_from_slice(client_random);

        let block_len = 2 * (MAC_SIZE + CIPHER_KEY_SIZE);
        let block = prf(master.as_bytes(), b"key expansion", &seed, block_len);

        let mut client = DirectionKeys {
            mac_key: [0u8; MAC_SIZE],
            cipher_key: [0u8; CIPHER_KEY_SIZE],
        };
        let mut server = client.clone();

        let mut at = 0;
        client.mac_key.copy_from_slice(&block[at..at + MAC_SIZE]);
        at += MAC_SIZE;
        server.mac_key.copy_from_slice(&block[at..at + MAC_SIZE]);
        at += MAC_SIZE;
        client
            .cipher_key
            .copy_from_slice(&block[at..at + CIPHER_KEY_SIZE]);
        at += CIPHER_KEY_SIZE;
        server
            .cipher_key
            .copy_from_slice(&block[at..at + CIPHER_KEY_SIZE]);

        Self { client, server }
    }

    /// Keys protecting the client-to-server direction.
    pub fn client(&self) -> &DirectionKeys {
        &self.client
    }

    /// Keys protecting the server-to-client direction.
    pub fn server(&self) -> &DirectionKeys {
        &self.server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premaster_layout() {
        let premaster = PremasterSecret::generate();
        let bytes = premaster.as_bytes();

        assert_eq!(bytes.len(), MASTER_SECRET_SIZE);
        assert_eq!(&bytes[..2], &PREMASTER_VERSION);
        // 46 random bytes, vanishingly unlikely to be all zero
        assert!(!bytes[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_master_secret_derivation() {
        let premaster = PremasterSecret::from_bytes([0x11u8; MASTER_SECRET_SIZE]);
        let client_random = [0x22u8; RANDOM_SIZE];
        let server_random = [0x33u8; RANDOM_SIZE];

        let master = MasterSecret::derive(&premaster, &client_random, &server_random);
        assert_eq!(master.as_bytes().len(), MASTER_SECRET_SIZE);

        // Deterministic given the same inputs
        let again = MasterSecret::derive(&premaster, &client_random, &server_random);
        assert_eq!(master.as_bytes(), again.as_bytes());

        // And sensitive to the randoms
        let other = MasterSecret::derive(&premaster, &server_random, &client_random);
        assert_ne!(master.as_bytes(), other.as_bytes());
    }

    #[test]
    fn test_key_block_partition() {
        let premaster = PremasterSecret::from_bytes([0x44u8; MASTER_SECRET_SIZE]);
        let client_random = [0x55u8; RANDOM_SIZE];
        let server_random = [0x66u8; RANDOM_SIZE];

        let master = MasterSecret::derive(&premaster, &client_random, &server_random);
        let keys = SessionKeys::derive(&master, &client_random, &server_random);

        // Partition must line up with the raw PRF output
        let mut seed = Vec::new();
        seed.extend_from_slice(&server_random);
        seed.extend_from_slice(&client_random);
        let block = prf(master.as_bytes(), b"key expansion", &seed, 72);

        assert_eq!(keys.client().mac_key.as_slice(), &block[..20]);
        assert_eq!(keys.server().mac_key.as_slice(), &block[20..40]);
        assert_eq!(keys.client().cipher_key.as_slice(), &block[40..56]);
        assert_eq!(keys.server().cipher_key.as_slice(), &block[56..72]);

        // Directions must not share keys
        assert_ne!(keys.client().mac_key, keys.server().mac_key);
        assert_ne!(keys.client().cipher_key, keys.server().cipher_key);
    }
}
