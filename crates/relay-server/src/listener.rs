//! TCP Listener
//!
//! Binds the accept socket with socket2 so the backlog and address reuse
//! can be configured, then hands it to tokio.

use crate::config::ServerConfig;
use crate::errors::ServerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

/// Accepting socket of the relay server
pub struct RelayListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RelayListener {
    /// Bind to the configured address
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.socket_addr()?;
        let bind_failed = |e: std::io::Error| ServerError::BindFailed {
            address: addr.to_string(),
            reason: e.to_string(),
        };

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_failed)?;

        socket.set_reuse_address(true).ok();
        socket.set_nonblocking(true).map_err(bind_failed)?;
        socket.bind(&addr.into()).map_err(bind_failed)?;
        socket.listen(config.listen_backlog).map_err(bind_failed)?;

        // Convert to tokio listener
        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)?;
        let local_addr = listener.local_addr()?;

        Ok(Self { listener, local_addr })
    }

    /// Accept the next connection
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true).ok();
        Ok((stream, peer))
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
