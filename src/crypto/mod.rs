//! Cryptographic primitives for the TLS 1.1 transport.
//!
//! This module provides:
//! - The TLS 1.0/1.1 pseudo-random function (P_MD5 XOR P_SHA1)
//! - Premaster/master secret handling and the RC4_128_SHA key block
//! - Record protection (RC4 keystream + HMAC-SHA1, per-direction sequence)
//! - Secure random number generation
//!
//! All secret material is zeroized on drop to prevent memory leakage.

mod keys;
mod prf;
mod random;
mod record;

pub use keys::{DirectionKeys, MasterSecret, PremasterSecret, SessionKeys};
pub use prf::{finished_verify_data, prf};
pub use random::SecureRandom;
pub use record::RecordCipher;

/// Size of the HMAC-SHA1 record MAC in bytes
pub const MAC_SIZE: usize = 20;

/// Size of the RC4-128 cipher key in bytes
pub const CIPHER_KEY_SIZE: usize = 16;

/// Size of premaster and master secrets in bytes
pub const MASTER_SECRET_SIZE: usize = 48;

/// Size of the hello random fields in bytes
pub const RANDOM_SIZE: usize = 32;

/// Size of the Finished verify_data field in bytes
pub const VERIFY_DATA_SIZE: usize = 12;
