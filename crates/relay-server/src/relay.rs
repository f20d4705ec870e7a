//! Message Relay
//!
//! Drives one connection through its lifecycle:
//!
//! ```text
//! Handshaking ──► Active ──► Closed
//!      │                       ▲
//!      └───── parse/IO error ──┘
//! ```
//!
//! In Active state every inbound frame is opened once under the sender's
//! cipher, then sealed once per other registered session under that
//! recipient's own keys.

use relay_crypto::RsaKeyPair;
use relay_protocol::{
    read_message, write_frame, ChannelCipher, CipherProfile, ConnectionHandle, ConnectionSession,
    ServerHandshake,
};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::errors::ServerResult;
use crate::registry::{FanOut, RelayRegistry};

/// Per-connection driver shared by every connection task
pub struct MessageRelay {
    registry: Arc<RelayRegistry>,
    keys: Arc<RsaKeyPair>,
    profile: CipherProfile,
    max_frame_len: usize,
}

impl MessageRelay {
    pub fn new(
        registry: Arc<RelayRegistry>,
        keys: Arc<RsaKeyPair>,
        profile: CipherProfile,
        max_frame_len: usize,
    ) -> Self {
        Self {
            registry,
            keys,
            profile,
            max_frame_len,
        }
    }

    pub fn registry(&self) -> &Arc<RelayRegistry> {
        &self.registry
    }

    pub fn profile(&self) -> CipherProfile {
        self.profile
    }

    /// Run the server side of the handshake to completion
    pub async fn handshake<R, W>(
        &self,
        handle: ConnectionHandle,
        reader: &mut R,
        writer: &mut W,
    ) -> ServerResult<ConnectionSession>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut handshake =
            ServerHandshake::new(handle, self.profile, self.keys.public_key()).with_frame_limit(self.max_frame_len);

        while !handshake.is_complete() {
            let frame = read_message(reader, self.max_frame_len).await?;
            let replies = handshake.on_frame(&frame, &mut rand::thread_rng())?;
            for reply in replies {
                debug!("{} -> {} {}", handle, reply.kind(), reply.to_line());
                write_frame(writer, reply.to_line().as_bytes(), self.max_frame_len).await?;
            }
        }

        Ok(handshake.finish()?)
    }

    /// Read one frame from `session` and relay it to every other session
    ///
    /// # Errors
    /// Transport and decode failures are returned and end the connection.
    /// Failures delivering to individual recipients are not errors; they
    /// appear in the returned [`FanOut`].
    pub async fn receive_and_broadcast<R>(
        &self,
        session: &ConnectionSession,
        inbound: &ChannelCipher,
        reader: &mut R,
    ) -> ServerResult<FanOut>
    where
        R: AsyncBufRead + Unpin,
    {
        let frame = read_message(reader, self.max_frame_len).await?;
        let plaintext = inbound.open(&frame)?;

        let keys = &self.keys;
        let report = self
            .registry
            .for_each_except(session.handle(), |recipient| {
                recipient.channel_cipher(keys)?.seal(&plaintext)
            })
            .await;

        debug!(
            "{} relayed {} bytes to {}/{} sessions",
            session.handle(),
            plaintext.len(),
            report.delivered.len(),
            report.recipients()
        );
        Ok(report)
    }

    /// Own one connection from accept to close
    ///
    /// Returns once the peer disconnects, a frame fails to parse or decode,
    /// or `shutdown` fires. The session is deregistered on every path out of
    /// the Active state.
    pub async fn run_connection<S>(
        &self,
        handle: ConnectionHandle,
        stream: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let mut session = tokio::select! {
            result = self.handshake(handle, &mut reader, &mut writer) => result?,
            _ = shutdown.changed() => {
                writer.shutdown().await.ok();
                return Ok(());
            }
        };
        let inbound = session.channel_cipher(&self.keys)?;

        session.mark_active();
        self.registry.add(session.clone(), Box::new(writer)).await;
        info!("{} joined ({} profile)", handle, self.profile);

        let result = loop {
            tokio::select! {
                relayed = self.receive_and_broadcast(&session, &inbound, &mut reader) => {
                    if let Err(e) = relayed {
                        break Err(e);
                    }
                }
                _ = shutdown.changed() => break Ok(()),
            }
        };

        self.registry.remove(handle).await;
        session.mark_closed();
        info!("{} left ({} active)", handle, self.registry.len().await);

        match result {
            Err(e) if e.is_disconnect() => Ok(()),
            other => other,
        }
    }
}
