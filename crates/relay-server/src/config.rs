//! Server Configuration
//!
//! Configuration types and defaults for the relay server.

use relay_core::is_prime;
use relay_crypto::{largest_modulus_in_range, range_supports_keys, RsaKeyPair, BYTE_RANGE};
use relay_protocol::{sealed_frame_len, CipherProfile, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT, DEFAULT_SERVER_PRIMES, MIN_FRAME_LEN};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Where the server's RSA primes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RsaPrimes {
    /// Operator-supplied primes
    Fixed { p: u64, q: u64 },
    /// Two distinct primes drawn from `[min, max]` at startup
    Random { min: u64, max: u64 },
}

impl Default for RsaPrimes {
    fn default() -> Self {
        let (p, q) = DEFAULT_SERVER_PRIMES;
        RsaPrimes::Fixed { p, q }
    }
}

impl RsaPrimes {
    /// Generate the server keypair
    pub fn keypair(&self) -> Result<RsaKeyPair, ConfigError> {
        let result = match *self {
            RsaPrimes::Fixed { p, q } => RsaKeyPair::generate(p, q),
            RsaPrimes::Random { min, max } => RsaKeyPair::generate_random(min, max, &mut rand::thread_rng()),
        };
        result.map_err(|e| ConfigError::InvalidValue(format!("rsa_primes: {}", e)))
    }

    /// Largest modulus the configured primes can produce
    fn largest_modulus(&self) -> Option<u64> {
        match *self {
            RsaPrimes::Fixed { p, q } => Some(p.saturating_mul(q)),
            RsaPrimes::Random { min, max } => largest_modulus_in_range(min, max),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            RsaPrimes::Fixed { p, q } => {
                if !is_prime(p) || !is_prime(q) {
                    return Err(ConfigError::InvalidValue(format!(
                        "rsa_primes {} and {} must both be prime",
                        p, q
                    )));
                }
                if p == q {
                    return Err(ConfigError::InvalidValue("rsa_primes must be distinct".into()));
                }
                if p.saturating_mul(q) < BYTE_RANGE {
                    return Err(ConfigError::InvalidValue(format!(
                        "rsa_primes product {} is below {}",
                        p * q,
                        BYTE_RANGE
                    )));
                }
            }
            RsaPrimes::Random { min, max } => {
                if !range_supports_keys(min, max) {
                    return Err(ConfigError::InvalidValue(format!(
                        "rsa_primes range [{}, {}] cannot produce a modulus of at least {}",
                        min, max, BYTE_RANGE
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,

    /// Bind port (0 picks an ephemeral port)
    pub bind_port: u16,

    /// Cipher layers negotiated with every client
    pub profile: CipherProfile,

    /// Longest accepted line, in bytes
    pub max_frame_len: usize,

    /// TCP accept backlog
    pub listen_backlog: i32,

    /// Log level
    pub log_level: String,

    /// Source of the server's RSA primes
    pub rsa_primes: RsaPrimes,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: DEFAULT_PORT,
            profile: CipherProfile::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            listen_backlog: 128,
            log_level: "info".to_string(),
            rsa_primes: RsaPrimes::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get the bind socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("bad bind_address {:?}", self.bind_address)))?;
        Ok(SocketAddr::new(ip, self.bind_port))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bind_address cannot be empty".into()));
        }
        self.socket_addr()?;

        if self.max_frame_len < MIN_FRAME_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "max_frame_len must be at least {}",
                MIN_FRAME_LEN
            )));
        }

        if self.listen_backlog <= 0 {
            return Err(ConfigError::InvalidValue("listen_backlog must be positive".into()));
        }

        self.rsa_primes.validate()?;

        // Clients send their messages encrypted under the server's modulus
        if self.profile.uses_rsa() {
            if let Some(modulus) = self.rsa_primes.largest_modulus() {
                let needed = sealed_frame_len(modulus);
                if needed > self.max_frame_len {
                    return Err(ConfigError::InvalidValue(format!(
                        "rsa_primes allow a modulus of {}, whose messages need {}-byte frames (max_frame_len is {})",
                        modulus, needed, self.max_frame_len
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Configuration builder
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set bind address
    pub fn bind_address(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_address = addr.into();
        self
    }

    /// Set bind port
    pub fn bind_port(mut self, port: u16) -> Self {
        self.config.bind_port = port;
        self
    }

    /// Set cipher profile
    pub fn profile(mut self, profile: CipherProfile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Use fixed RSA primes
    pub fn rsa_primes(mut self, p: u64, q: u64) -> Self {
        self.config.rsa_primes = RsaPrimes::Fixed { p, q };
        self
    }

    /// Draw RSA primes from a range at startup
    pub fn random_rsa_primes(mut self, min: u64, max: u64) -> Self {
        self.config.rsa_primes = RsaPrimes::Random { min, max };
        self
    }

    /// Set maximum frame length
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Set accept backlog
    pub fn listen_backlog(mut self, backlog: i32) -> Self {
        self.config.listen_backlog = backlog;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
