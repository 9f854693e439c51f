//! TCP server accepting remote volume control clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pcvc_core::{ProtocolVersion, StateProvider};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use crate::codec::DEFAULT_MAX_FRAME_BYTES;
use crate::connection::Connection;
use crate::error::ProtocolResult;

/// Settings applied to every accepted connection.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Version every message must carry
    pub version: ProtocolVersion,
    /// Longest accepted frame payload
    pub max_frame_bytes: usize,
    /// Close clients that send nothing for this long
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::CURRENT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            idle_timeout: None,
        }
    }
}

/// Server that listens for clients and runs one task per connection.
pub struct ProtocolServer {
    listener: TcpListener,
    config: ServerConfig,
    provider: Arc<dyn StateProvider>,
    next_client_id: AtomicU64,
}

impl ProtocolServer {
    /// Create a server bound to `addr`.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: ServerConfig,
        provider: Arc<dyn StateProvider>,
    ) -> ProtocolResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = ?listener.local_addr().ok(), version = %config.version, "Protocol server listening");

        Ok(Self { listener, config, provider, next_client_id: AtomicU64::new(1) })
    }

    /// Address the server is listening on.
    ///
    /// # Errors
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> ProtocolResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections until the task is dropped.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
                    info!(client_id, %peer, "Client connected");

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(client_id, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let connection =
                        Connection::new(client_id, stream, &self.config, Arc::clone(&self.provider));

                    tokio::spawn(async move {
                        match connection.run().await {
                            Ok(()) => info!(client_id, "Client handler exiting"),
                            Err(e) => warn!(client_id, error = %e, "Connection torn down"),
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                }
            }
        }
    }
}
