//! # Relay Server
//!
//! Multi-party encrypted chat relay.
//!
//! ## Features
//!
//! - Line-framed TCP with a configurable frame limit
//! - Per-connection RSA key swap and Diffie-Hellman agreement
//! - Decrypt once per message, re-encrypt once per recipient
//! - Supervised connection tasks joined on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Relay Server                         │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │ TCP Listener │──►│ Conn. tasks  │──►│ RelayRegistry │  │
//! │  │  (socket2)   │   │  (JoinSet)   │   │ (one mutex)   │  │
//! │  └──────────────┘   └──────────────┘   └───────────────┘  │
//! │                            │                   ▲          │
//! │                            ▼                   │          │
//! │                     ┌──────────────┐   ┌───────────────┐  │
//! │                     │  Handshake   │   │ MessageRelay  │  │
//! │                     │ RSA then DH  │   │ open / seal   │  │
//! │                     └──────────────┘   └───────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod errors;
pub mod listener;
pub mod registry;
pub mod relay;

pub use config::*;
pub use errors::*;
pub use listener::*;
pub use registry::*;
pub use relay::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::errors::*;
    pub use crate::listener::*;
    pub use crate::registry::*;
    pub use crate::relay::*;
}

use relay_crypto::RsaKeyPair;
use relay_protocol::ConnectionHandle;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Pause after the first failed accept
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Longest pause between accept attempts
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors
///
/// Doubles per failure up to [`ACCEPT_BACKOFF_MAX`], so persistent errors
/// such as descriptor exhaustion do not spin the accept loop.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1u32 << failures.saturating_sub(1).min(16))
        .min(ACCEPT_BACKOFF_MAX)
}

/// Relay server
///
/// Owns the listener, the server keypair and the registry; nothing is
/// process-global, so several servers can run side by side.
pub struct RelayServer {
    config: ServerConfig,
    listener: RelayListener,
    keys: Arc<RsaKeyPair>,
    relay: Arc<MessageRelay>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
    next_handle: AtomicU64,
}

impl RelayServer {
    /// Generate the server keypair and bind the listener
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let keys = Arc::new(config.rsa_primes.keypair()?);
        let listener = RelayListener::bind(&config)?;
        let registry = Arc::new(RelayRegistry::new(config.max_frame_len));
        let relay = Arc::new(MessageRelay::new(
            registry,
            Arc::clone(&keys),
            config.profile,
            config.max_frame_len,
        ));
        let (shutdown, _) = watch::channel(false);

        info!(
            "Server key (e={}, n={}), profile {}",
            keys.public_exponent(),
            keys.modulus(),
            config.profile
        );

        Ok(Self {
            config,
            listener,
            keys,
            relay,
            shutdown,
            running: AtomicBool::new(false),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn public_key(&self) -> relay_crypto::RsaPublicKey {
        self.keys.public_key()
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of Active sessions
    pub async fn session_count(&self) -> usize {
        self.relay.registry().len().await
    }

    /// Accept connections until [`shutdown`](Self::shutdown) is called
    ///
    /// Every connection runs in its own task; all of them are joined before
    /// this returns.
    pub async fn serve(&self) -> ServerResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let mut shutdown = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();
        let mut accept_failures = 0u32;
        info!("Relay listening on {}", self.local_addr());

        while !*shutdown.borrow() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        accept_failures = 0;
                        let handle = ConnectionHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
                        debug!("{} accepted from {}", handle, peer);

                        let relay = Arc::clone(&self.relay);
                        let stop = self.shutdown.subscribe();
                        tasks.spawn(async move {
                            match relay.run_connection(handle, stream, stop).await {
                                Ok(()) => {}
                                Err(e) if e.is_disconnect() => debug!("{} dropped: {}", handle, e),
                                Err(e) => warn!("{} closed: {}", handle, e),
                            }
                        });
                    }
                    Err(e) => {
                        accept_failures = accept_failures.saturating_add(1);
                        let delay = accept_backoff(accept_failures);
                        warn!("Accept failed ({} in a row), retrying in {:?}: {}", accept_failures, delay, e);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Connection task failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {}
            }
        }

        info!("Stopping relay, joining {} connection tasks", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Connection task failed: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Relay stopped");
        Ok(())
    }

    /// Signal `serve` and every connection task to stop
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::CipherProfile;

    fn loopback() -> ServerConfig {
        ServerConfig::builder()
            .bind_address("127.0.0.1")
            .bind_port(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = RelayServer::bind(loopback()).unwrap();
        assert!(!server.is_running());
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.public_key().modulus, 3233);
        assert_eq!(server.config().profile, CipherProfile::Layered);
        assert_eq!(server.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_serve_and_shutdown() {
        let server = Arc::new(RelayServer::bind(loopback()).unwrap());
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve().await })
        };

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !server.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(server.serve().await, Err(ServerError::AlreadyRunning)));

        server.shutdown();
        task.await.unwrap().unwrap();
        assert!(!server.is_running());
    }

    #[test]
    fn test_accept_backoff_grows_and_caps() {
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(2), Duration::from_millis(20));
        assert_eq!(accept_backoff(5), Duration::from_millis(160));
        assert_eq!(accept_backoff(8), ACCEPT_BACKOFF_MAX);
        assert_eq!(accept_backoff(u32::MAX), ACCEPT_BACKOFF_MAX);
        for failures in 1..40 {
            assert!(accept_backoff(failures) <= accept_backoff(failures + 1));
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_serve() {
        let server = RelayServer::bind(loopback()).unwrap();
        server.shutdown();
        server.serve().await.unwrap();
    }
}
