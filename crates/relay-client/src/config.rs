//! Client Configuration
//!
//! Configuration types and defaults for the chat client.

use crate::errors::ClientError;
use relay_crypto::{largest_modulus_in_range, range_supports_keys};
use relay_protocol::{sealed_frame_len, CipherProfile, DEFAULT_CLIENT_PRIME_RANGE, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT, MIN_FRAME_LEN};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub server_address: String,

    /// Cipher layers; must match the server
    pub profile: CipherProfile,

    /// Lower bound for the client's RSA primes
    pub prime_min: u64,

    /// Upper bound for the client's RSA primes
    pub prime_max: u64,

    /// Longest accepted line, in bytes
    pub max_frame_len: usize,

    /// Handshake timeout in seconds (0 waits forever)
    pub handshake_timeout_secs: u64,

    /// Log level
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let (prime_min, prime_max) = DEFAULT_CLIENT_PRIME_RANGE;
        Self {
            server_address: format!("127.0.0.1:{}", DEFAULT_PORT),
            profile: CipherProfile::default(),
            prime_min,
            prime_max,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            handshake_timeout_secs: 10,
            log_level: "warn".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ClientError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve the server address to a SocketAddr
    pub fn resolve_server_address(&self) -> Result<SocketAddr, ClientError> {
        self.server_address
            .to_socket_addrs()
            .map_err(|e| ClientError::DnsResolutionFailed {
                host: self.server_address.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ClientError::InvalidAddress(self.server_address.clone()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.server_address.trim().is_empty() {
            return Err(ClientError::Config("Server address is required".into()));
        }

        if self.max_frame_len < MIN_FRAME_LEN {
            return Err(ClientError::Config(format!(
                "Max frame length must be at least {}",
                MIN_FRAME_LEN
            )));
        }

        if !range_supports_keys(self.prime_min, self.prime_max) {
            return Err(ClientError::Config(format!(
                "Prime range [{}, {}] cannot produce an RSA modulus above 255",
                self.prime_min, self.prime_max
            )));
        }

        // Relayed messages arrive encrypted under this client's own modulus
        if self.profile.uses_rsa() {
            if let Some(modulus) = largest_modulus_in_range(self.prime_min, self.prime_max) {
                let needed = sealed_frame_len(modulus);
                if needed > self.max_frame_len {
                    return Err(ClientError::Config(format!(
                        "Prime range [{}, {}] allows a modulus of {}, whose messages need {}-byte frames (max_frame_len is {})",
                        self.prime_min, self.prime_max, modulus, needed, self.max_frame_len
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Configuration builder
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set server address
    pub fn server_address(mut self, addr: impl Into<String>) -> Self {
        self.config.server_address = addr.into();
        self
    }

    /// Set cipher profile
    pub fn profile(mut self, profile: CipherProfile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Set the range the client's RSA primes are drawn from
    pub fn prime_range(mut self, min: u64, max: u64) -> Self {
        self.config.prime_min = min;
        self.config.prime_max = max;
        self
    }

    /// Set maximum frame length
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, secs: u64) -> Self {
        self.config.handshake_timeout_secs = secs;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
