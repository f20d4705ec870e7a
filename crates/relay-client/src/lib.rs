//! # Relay Client
//!
//! Client library for cipher-relay servers.
//!
//! ## Features
//!
//! - Async TCP connection and client-side handshake
//! - Per-connection cipher matching the server's profile
//! - Independent sender and receiver halves
//!
//! ## Quick Start
//!
//! ```ignore
//! use relay_client::{ClientConfig, ClientError, RelayClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     let config = ClientConfig::builder()
//!         .server_address("127.0.0.1:8001")
//!         .build()?;
//!
//!     let (mut sender, mut receiver) = RelayClient::connect(&config).await?.into_split();
//!     sender.send("Hello, everyone").await?;
//!
//!     while let Some(line) = receiver.recv().await? {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;

pub use config::*;
pub use errors::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::errors::*;
    pub use crate::{ChatConnection, ChatReceiver, ChatSender, RelayClient};
}

use relay_crypto::RsaKeyPair;
use relay_protocol::{
    read_frame, read_message, write_frame, ChannelCipher, ClientHandshake, ConnectionSession,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Entry point for connecting to a relay
pub struct RelayClient;

impl RelayClient {
    /// Connect and complete the handshake
    pub async fn connect(config: &ClientConfig) -> ClientResult<ChatConnection> {
        config.validate()?;
        let server_addr = config.resolve_server_address()?;
        debug!("Connecting to relay at {}", server_addr);

        let stream = TcpStream::connect(server_addr)
            .await
            .map_err(|e| ClientError::ConnectionFailed {
                address: server_addr.to_string(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true).ok();

        let keys = RsaKeyPair::generate_random(config.prime_min, config.prime_max, &mut rand::thread_rng())?;
        debug!("Client key (e={}, n={})", keys.public_exponent(), keys.modulus());

        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let handshake = Self::handshake(config, &keys, &mut reader, &mut writer);
        let session = if config.handshake_timeout_secs == 0 {
            handshake.await?
        } else {
            tokio::time::timeout(Duration::from_secs(config.handshake_timeout_secs), handshake)
                .await
                .map_err(|_| ClientError::HandshakeTimeout)??
        };

        let cipher = Arc::new(session.channel_cipher(&keys)?);
        info!("Connected to relay at {} ({} profile)", server_addr, config.profile);

        Ok(ChatConnection {
            server_addr,
            session,
            sender: ChatSender {
                writer,
                cipher: Arc::clone(&cipher),
                max_frame_len: config.max_frame_len,
            },
            receiver: ChatReceiver {
                reader,
                cipher,
                max_frame_len: config.max_frame_len,
            },
        })
    }

    async fn handshake<R, W>(
        config: &ClientConfig,
        keys: &RsaKeyPair,
        reader: &mut R,
        writer: &mut W,
    ) -> ClientResult<ConnectionSession>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut handshake =
            ClientHandshake::new(config.profile, keys.public_key()).with_frame_limit(config.max_frame_len);

        for msg in handshake.start()? {
            write_frame(writer, msg.to_line().as_bytes(), config.max_frame_len).await?;
        }

        while !handshake.is_complete() {
            let frame = read_message(reader, config.max_frame_len).await?;
            let replies = handshake
                .on_frame(&frame, &mut rand::thread_rng())
                .map_err(|e| ClientError::Handshake(e.to_string()))?;
            for msg in replies {
                write_frame(writer, msg.to_line().as_bytes(), config.max_frame_len).await?;
            }
        }

        Ok(handshake.finish()?)
    }
}

/// An established relay connection
pub struct ChatConnection {
    server_addr: SocketAddr,
    session: ConnectionSession,
    sender: ChatSender,
    receiver: ChatReceiver,
}

impl ChatConnection {
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Key material negotiated with the server
    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub async fn send(&mut self, text: &str) -> ClientResult<()> {
        self.sender.send(text).await
    }

    pub async fn recv(&mut self) -> ClientResult<Option<String>> {
        self.receiver.recv().await
    }

    /// Split into halves that can live on different tasks
    pub fn into_split(self) -> (ChatSender, ChatReceiver) {
        (self.sender, self.receiver)
    }
}

/// Outbound half of a connection
pub struct ChatSender {
    writer: OwnedWriteHalf,
    cipher: Arc<ChannelCipher>,
    max_frame_len: usize,
}

impl ChatSender {
    /// Encrypt and send one message
    ///
    /// Text past the cipher's message limit is cut off.
    pub async fn send(&mut self, text: &str) -> ClientResult<()> {
        let frame = self.cipher.seal(text.as_bytes())?;
        write_frame(&mut self.writer, &frame, self.max_frame_len).await?;
        Ok(())
    }

    /// Close the write direction; the server treats this as a disconnect
    pub async fn close(mut self) -> ClientResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Inbound half of a connection
pub struct ChatReceiver {
    reader: BufReader<OwnedReadHalf>,
    cipher: Arc<ChannelCipher>,
    max_frame_len: usize,
}

impl ChatReceiver {
    /// Next relayed message, or `None` once the server closes the connection
    pub async fn recv(&mut self) -> ClientResult<Option<String>> {
        loop {
            match read_frame(&mut self.reader, self.max_frame_len).await? {
                None => return Ok(None),
                Some(frame) if frame.iter().all(|b| b.is_ascii_whitespace()) => continue,
                Some(frame) => {
                    let plaintext = self.cipher.open(&frame)?;
                    return Ok(Some(String::from_utf8_lossy(&plaintext).into_owned()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::{CipherProfile, ConnectionHandle, ServerHandshake, DEFAULT_MAX_FRAME_LEN};
    use tokio::net::TcpListener;

    /// Accept one client and run the server side of the handshake by hand
    async fn one_shot_server(
        profile: CipherProfile,
    ) -> (SocketAddr, tokio::task::JoinHandle<(BufReader<OwnedReadHalf>, OwnedWriteHalf, ChannelCipher)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut writer) = stream.into_split();
            let mut reader = BufReader::new(read_half);

            let keys = RsaKeyPair::generate(61, 53).unwrap();
            let mut handshake = ServerHandshake::new(ConnectionHandle::new(1), profile, keys.public_key());
            while !handshake.is_complete() {
                let frame = read_message(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap();
                let replies = handshake.on_frame(&frame, &mut rand::thread_rng()).unwrap();
                for msg in replies {
                    write_frame(&mut writer, msg.to_line().as_bytes(), DEFAULT_MAX_FRAME_LEN)
                        .await
                        .unwrap();
                }
            }
            let cipher = handshake.finish().unwrap().channel_cipher(&keys).unwrap();
            (reader, writer, cipher)
        });

        (addr, task)
    }

    fn config_for(addr: SocketAddr, profile: CipherProfile) -> ClientConfig {
        ClientConfig::builder()
            .server_address(addr.to_string())
            .profile(profile)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_send_recv() {
        let (addr, server) = one_shot_server(CipherProfile::Layered).await;
        let mut conn = RelayClient::connect(&config_for(addr, CipherProfile::Layered)).await.unwrap();
        let (mut reader, mut writer, cipher) = server.await.unwrap();

        assert_eq!(conn.server_addr(), addr);
        assert!(conn.session().session_key().unwrap().is_some());

        conn.send("Hello, server").await.unwrap();
        let frame = read_message(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(cipher.open(&frame).unwrap(), b"Hello, server");

        let reply = cipher.seal(b"Hello, client").unwrap();
        write_frame(&mut writer, &reply, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("Hello, client"));

        drop(writer);
        drop(reader);
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_halves() {
        let (addr, server) = one_shot_server(CipherProfile::Rsa).await;
        let conn = RelayClient::connect(&config_for(addr, CipherProfile::Rsa)).await.unwrap();
        let (mut reader, _writer, cipher) = server.await.unwrap();

        let (mut sender, _receiver) = conn.into_split();
        sender.send("one").await.unwrap();
        sender.send("two").await.unwrap();
        sender.close().await.unwrap();

        for expected in ["one", "two"] {
            let frame = read_message(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap();
            assert_eq!(cipher.open(&frame).unwrap(), expected.as_bytes());
        }
        assert!(read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = RelayClient::connect(&config_for(addr, CipherProfile::Layered)).await;
        assert!(matches!(result, Err(ClientError::ConnectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_handshake_rejects_garbage() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"this is not a key\n").await.unwrap();
            stream
        });

        let result = RelayClient::connect(&config_for(addr, CipherProfile::Layered)).await;
        assert!(matches!(result, Err(ClientError::Handshake(_))));
        drop(server.await.unwrap());
    }
}
