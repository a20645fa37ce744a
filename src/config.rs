//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::TOKEN_LEN;

/// Configuration for a tunnel client.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway hostname or address
    pub server_host: String,

    /// Gateway port (typically 443, shared with HTTPS)
    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Session token issued by the authenticator (48 bytes, hex-encoded
    /// for config files)
    #[serde(with = "hex_bytes")]
    pub session_token: [u8; TOKEN_LEN],

    /// Acknowledge that the gateway's certificate chain is not verified.
    ///
    /// The gateway never presents a verifiable chain, so the client
    /// refuses to dial until this is set. It defaults to off precisely
    /// so the trust bypass has to be spelled out in the config file.
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Name for the virtual interface
    #[serde(default = "default_tun_name")]
    pub tun_name: String,

    /// Budget for each setup phase of a connection: TCP connect plus the
    /// TLS handshake, then the role handshake that follows
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_port() -> u16 {
    443
}

fn default_tun_name() -> String {
    "l3tun0".to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    crate::HANDSHAKE_TIMEOUT_MS
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the
    /// gateway host and token. The trust bypass stays off; callers must
    /// enable it deliberately.
    pub fn new(server_host: impl Into<String>, session_token: [u8; TOKEN_LEN]) -> Self {
        Self {
            server_host: server_host.into(),
            server_port: default_port(),
            session_token,
            insecure_skip_verify: false,
            tun_name: default_tun_name(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(data).map_err(|e| Error::config(format!("bad config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server_host.is_empty() {
            return Err(Error::config("server_host cannot be empty"));
        }
        if self.server_port == 0 {
            return Err(Error::config("server_port cannot be zero"));
        }
        if self.session_token == [0u8; TOKEN_LEN] {
            return Err(Error::auth("session token is unset"));
        }
        if !self.insecure_skip_verify {
            return Err(Error::config(
                "insecure_skip_verify must be set: the gateway chain cannot be verified and the client will not dial without the explicit bypass",
            ));
        }
        if self.tun_name.is_empty() {
            return Err(Error::config("tun_name cannot be empty"));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(Error::config("handshake_timeout_ms cannot be zero"));
        }
        Ok(())
    }
}

// Custom serde helper for the hex-encoded token
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::TOKEN_LEN;

    pub fn serialize<S>(bytes: &[u8; TOKEN_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; TOKEN_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::new("vpn.example.com", [0x5Au8; TOKEN_LEN]);
        assert!(config.validate().is_err()); // bypass not acknowledged

        config.insecure_skip_verify = true;
        assert!(config.validate().is_ok());

        config.server_port = 0;
        assert!(config.validate().is_err());
        config.server_port = 443;

        config.server_host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unset_token_is_an_auth_error() {
        let mut config = ClientConfig::new("vpn.example.com", [0u8; TOKEN_LEN]);
        config.insecure_skip_verify = true;

        assert!(matches!(config.validate(), Err(Error::Auth(_))));
    }

    #[test]
    fn test_config_from_json_with_defaults() {
        let token_hex = "ab".repeat(TOKEN_LEN);
        let data = format!(
            r#"{{"server_host": "vpn.example.com", "session_token": "{}", "insecure_skip_verify": true}}"#,
            token_hex
        );

        let config = ClientConfig::from_json(&data).unwrap();
        assert_eq!(config.server_host, "vpn.example.com");
        assert_eq!(config.server_port, 443);
        assert_eq!(config.session_token, [0xABu8; TOKEN_LEN]);
        assert_eq!(config.tun_name, "l3tun0");
        assert_eq!(config.handshake_timeout_ms, 10_000);
    }

    #[test]
    fn test_token_must_be_48_bytes() {
        let data = r#"{"server_host": "vpn.example.com", "session_token": "abcd", "insecure_skip_verify": true}"#;
        assert!(matches!(
            ClientConfig::from_json(data),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = ClientConfig::new("10.0.0.1", [0x17u8; TOKEN_LEN]);
        config.insecure_skip_verify = true;

        let json = serde_json::to_string(&config).unwrap();
        let parsed = ClientConfig::from_json(&json).unwrap();
        assert_eq!(parsed.session_token, config.session_token);
        assert_eq!(parsed.server_host, config.server_host);
    }
}
