//! Relay Registry
//!
//! The set of Active connections and the write half of each. One tokio
//! mutex guards the whole table: add, remove and broadcast iteration are
//! mutually exclusive, and the lock stays held across every send of a
//! broadcast.
//!
//! ## Known limitation
//!
//! A recipient whose socket stops draining blocks the broadcast in progress
//! and, through the same lock, every registration and removal until its
//! send completes or fails.

use relay_protocol::{write_frame, ConnectionHandle, ConnectionSession, ProtocolResult};
use std::collections::HashMap;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Write half of a registered connection
pub type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A registered connection
struct RegisteredPeer {
    session: ConnectionSession,
    writer: PeerWriter,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Recipients whose frame was written and flushed
    pub delivered: Vec<ConnectionHandle>,
    /// Recipients whose frame could not be built or written
    pub failed: Vec<ConnectionHandle>,
}

impl FanOut {
    pub fn recipients(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Active connections, keyed by handle
pub struct RelayRegistry {
    peers: Mutex<HashMap<ConnectionHandle, RegisteredPeer>>,
    max_frame_len: usize,
}

impl RelayRegistry {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            max_frame_len,
        }
    }

    /// Register an Active session together with its write half
    ///
    /// Re-adding a handle replaces the earlier entry.
    pub async fn add(&self, session: ConnectionSession, writer: PeerWriter) {
        let handle = session.handle();
        let mut peers = self.peers.lock().await;
        if peers.insert(handle, RegisteredPeer { session, writer }).is_some() {
            warn!("{} registered twice; replacing", handle);
        }
        debug!("{} registered ({} active)", handle, peers.len());
    }

    /// Deregister a session, dropping its write half
    pub async fn remove(&self, handle: ConnectionHandle) -> Option<ConnectionSession> {
        let mut peers = self.peers.lock().await;
        let removed = peers.remove(&handle).map(|peer| peer.session);
        if removed.is_some() {
            debug!("{} deregistered ({} active)", handle, peers.len());
        }
        removed
    }

    pub async fn contains(&self, handle: ConnectionHandle) -> bool {
        self.peers.lock().await.contains_key(&handle)
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }

    /// Build a frame for every session except `except` and send it
    ///
    /// `frame_for` runs once per recipient. A recipient whose frame cannot
    /// be built or written is reported in [`FanOut::failed`]; its own
    /// connection task notices the broken transport and deregisters it.
    pub async fn for_each_except<F>(&self, except: ConnectionHandle, mut frame_for: F) -> FanOut
    where
        F: FnMut(&ConnectionSession) -> ProtocolResult<Vec<u8>>,
    {
        let mut peers = self.peers.lock().await;
        let mut report = FanOut::default();

        for (handle, peer) in peers.iter_mut() {
            if *handle == except {
                continue;
            }

            let sent = match frame_for(&peer.session) {
                Ok(frame) => write_frame(&mut peer.writer, &frame, self.max_frame_len).await,
                Err(e) => Err(e),
            };

            match sent {
                Ok(()) => report.delivered.push(*handle),
                Err(e) => {
                    warn!("Relay to {} failed: {}", handle, e);
                    report.failed.push(*handle);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::{read_frame, CipherProfile, ProtocolError};
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream};

    fn plain_session(id: u64) -> ConnectionSession {
        let mut session =
            ConnectionSession::new(ConnectionHandle::new(id), CipherProfile::Plain, None, None);
        session.mark_active();
        session
    }

    /// Register `id` and return the far end of its pipe
    async fn register(registry: &RelayRegistry, id: u64) -> BufReader<DuplexStream> {
        let (near, far) = tokio::io::duplex(1024);
        registry.add(plain_session(id), Box::new(near)).await;
        BufReader::new(far)
    }

    #[tokio::test]
    async fn test_add_remove() {
        let registry = RelayRegistry::new(64);
        assert!(registry.is_empty().await);

        let _a = register(&registry, 1).await;
        let _b = register(&registry, 2).await;
        assert_eq!(registry.len().await, 2);
        assert!(registry.contains(ConnectionHandle::new(2)).await);

        let removed = registry.remove(ConnectionHandle::new(2)).await.unwrap();
        assert_eq!(removed.handle(), ConnectionHandle::new(2));
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(ConnectionHandle::new(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_for_each_except_skips_sender() {
        let registry = RelayRegistry::new(64);
        let mut one = register(&registry, 1).await;
        let mut two = register(&registry, 2).await;
        let mut three = register(&registry, 3).await;

        let report = registry
            .for_each_except(ConnectionHandle::new(1), |session| {
                Ok(format!("to {}", session.handle()).into_bytes())
            })
            .await;

        let mut delivered = report.delivered.clone();
        delivered.sort();
        assert_eq!(delivered, vec![ConnectionHandle::new(2), ConnectionHandle::new(3)]);
        assert!(report.failed.is_empty());

        assert_eq!(read_frame(&mut two, 64).await.unwrap().unwrap(), b"to #2");
        assert_eq!(read_frame(&mut three, 64).await.unwrap().unwrap(), b"to #3");

        // Nothing was written back to the sender
        registry.remove(ConnectionHandle::new(1)).await;
        let mut rest = Vec::new();
        one.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_failed_frame_reported() {
        let registry = RelayRegistry::new(64);
        let _one = register(&registry, 1).await;
        let mut two = register(&registry, 2).await;
        let _three = register(&registry, 3).await;

        let report = registry
            .for_each_except(ConnectionHandle::new(1), |session| {
                if session.handle() == ConnectionHandle::new(3) {
                    Err(ProtocolError::InvalidState("no key".into()))
                } else {
                    Ok(b"ok".to_vec())
                }
            })
            .await;

        assert_eq!(report.delivered, vec![ConnectionHandle::new(2)]);
        assert_eq!(report.failed, vec![ConnectionHandle::new(3)]);
        assert_eq!(report.recipients(), 2);
        assert_eq!(read_frame(&mut two, 64).await.unwrap().unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_closed_recipient_fails_without_blocking_others() {
        let registry = RelayRegistry::new(64);
        let _one = register(&registry, 1).await;
        let gone = register(&registry, 2).await;
        let mut three = register(&registry, 3).await;
        drop(gone);

        let report = registry
            .for_each_except(ConnectionHandle::new(1), |_| Ok(b"hello".to_vec()))
            .await;

        assert_eq!(report.failed, vec![ConnectionHandle::new(2)]);
        assert_eq!(report.delivered, vec![ConnectionHandle::new(3)]);
        assert_eq!(read_frame(&mut three, 64).await.unwrap().unwrap(), b"hello");
    }
}
