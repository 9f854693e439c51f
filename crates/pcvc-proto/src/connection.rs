//! Server side of a single client connection.

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use pcvc_core::{FullState, Reconciler, StateProvider, UpdateDocument};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::{JsonLineCodec, next_frame};
use crate::error::ProtocolResult;
use crate::server::ServerConfig;

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Seeded, full state not yet delivered
    AwaitingHandshakeSend,
    /// Handshake sent, processing updates
    Established,
    /// Socket shut down
    Closed,
}

/// One client socket and the state it owns.
///
/// Each connection is seeded from the provider and keeps its own copy of the
/// state; updates from other connections are not visible here.
pub struct Connection<S> {
    client_id: u64,
    framed: Framed<S, JsonLineCodec>,
    state: FullState,
    reconciler: Reconciler,
    provider: Arc<dyn StateProvider>,
    idle_timeout: Option<Duration>,
    phase: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Seed a connection for `stream` from the provider's current state.
    pub fn new(
        client_id: u64,
        stream: S,
        config: &ServerConfig,
        provider: Arc<dyn StateProvider>,
    ) -> Self {
        let mut state = provider.full_state();
        state.version = config.version;

        Self {
            client_id,
            framed: Framed::new(stream, JsonLineCodec::with_max_length(config.max_frame_bytes)),
            state,
            reconciler: Reconciler::new(config.version),
            provider,
            idle_timeout: config.idle_timeout,
            phase: ConnectionState::AwaitingHandshakeSend,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ConnectionState {
        self.phase
    }

    /// The state as this connection currently sees it.
    #[must_use]
    pub fn state(&self) -> &FullState {
        &self.state
    }

    /// Run the connection to completion.
    ///
    /// Returns `Ok(())` when the peer closes cleanly. Any protocol violation
    /// ends the connection and is returned; the socket is shut down either way.
    ///
    /// # Errors
    /// Returns the error that tore the connection down.
    pub async fn run(mut self) -> ProtocolResult<()> {
        let result = self.serve().await;
        self.close().await;
        result
    }

    async fn serve(&mut self) -> ProtocolResult<()> {
        self.framed.send(self.state.clone()).await?;
        self.transition(ConnectionState::Established);

        while let Some(frame) = next_frame(&mut self.framed, self.idle_timeout).await? {
            let update = UpdateDocument::from_value(frame, self.reconciler.version())?;
            let outcome = self.reconciler.apply(&mut self.state, &update)?;
            self.provider.commit(&update)?;

            debug!(
                client_id = self.client_id,
                category = %outcome.category,
                changed_sessions = outcome.changed_sessions.len(),
                "Update applied"
            );

            self.framed.send(self.state.clone()).await?;
        }

        debug!(client_id = self.client_id, "Client disconnected");
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = SinkExt::<FullState>::close(&mut self.framed).await {
            debug!(client_id = self.client_id, error = %e, "Error shutting down socket");
        }
        self.transition(ConnectionState::Closed);
    }

    fn transition(&mut self, next: ConnectionState) {
        info!(client_id = self.client_id, from = ?self.phase, to = ?next, "Connection state");
        self.phase = next;
    }
}
