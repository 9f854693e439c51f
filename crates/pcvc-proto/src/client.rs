//! Remote volume control client.

use std::time::Duration;

use futures::SinkExt;
use pcvc_core::classify::{mute_toggle_patches, volume_patches};
use pcvc_core::{DeviceId, FullState, ProtocolVersion, Reconciled, Reconciler, UpdateDocument};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::{DEFAULT_MAX_FRAME_BYTES, JsonLineCodec, next_frame};
use crate::error::{ProtocolError, ProtocolResult};

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Version this client speaks; the server must match it exactly
    pub version: ProtocolVersion,
    pub max_frame_bytes: usize,
    /// Bound on waiting for the handshake and for each reply
    pub reply_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::CURRENT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            reply_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Client holding a cached copy of the server's mixer state.
///
/// Operations update the cache optimistically, push the update, then replace
/// the cache with the server's reply.
pub struct MixerClient<S = TcpStream> {
    framed: Framed<S, JsonLineCodec>,
    state: FullState,
    reconciler: Reconciler,
    reply_timeout: Option<Duration>,
}

impl MixerClient<TcpStream> {
    /// Connect to a server and perform the handshake.
    ///
    /// # Errors
    /// Returns an error if the connection fails or the server speaks another
    /// protocol version.
    pub async fn connect(addr: impl ToSocketAddrs, config: ClientConfig) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream, config).await
    }
}

impl<S> MixerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the handshake over an already connected stream.
    ///
    /// Nothing is written to the stream before the server's version has been
    /// verified.
    ///
    /// # Errors
    /// Returns an error if the handshake frame is missing, unparseable, or
    /// carries another protocol version.
    pub async fn from_stream(stream: S, config: ClientConfig) -> ProtocolResult<Self> {
        let mut framed =
            Framed::new(stream, JsonLineCodec::with_max_length(config.max_frame_bytes));
        let state = read_state(&mut framed, config.reply_timeout, config.version).await?;

        info!(
            version = %state.version,
            device = %state.default_device.device_id,
            sessions = state.default_device.sessions.len(),
            "Handshake complete"
        );

        Ok(Self {
            framed,
            state,
            reconciler: Reconciler::new(config.version),
            reply_timeout: config.reply_timeout,
        })
    }

    /// Cached mixer state.
    #[must_use]
    pub fn state(&self) -> &FullState {
        &self.state
    }

    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.reconciler.version()
    }

    /// Make `device_id` the host's default output device.
    ///
    /// # Errors
    /// Returns an error if the update cannot be delivered or the reply is invalid.
    pub async fn switch_default_device(&mut self, device_id: DeviceId) -> ProtocolResult<()> {
        let update = UpdateDocument::device_switch(self.version(), device_id);
        self.push(update).await.map(|_| ())
    }

    /// Set the default device's master volume.
    ///
    /// # Errors
    /// Returns an error if the update cannot be delivered or the reply is invalid.
    pub async fn set_master_volume(&mut self, volume: f64) -> ProtocolResult<()> {
        let update = UpdateDocument::master_volume(self.version(), self.device_id(), volume);
        self.push(update).await.map(|_| ())
    }

    /// Set the default device's master mute state.
    ///
    /// # Errors
    /// Returns an error if the update cannot be delivered or the reply is invalid.
    pub async fn set_master_muted(&mut self, muted: bool) -> ProtocolResult<()> {
        let update = UpdateDocument::master_muted(self.version(), self.device_id(), muted);
        self.push(update).await.map(|_| ())
    }

    /// Flip the default device's master mute state.
    ///
    /// # Errors
    /// Returns an error if the update cannot be delivered or the reply is invalid.
    pub async fn toggle_master_mute(&mut self) -> ProtocolResult<()> {
        let muted = !self.state.default_device.master_muted;
        self.set_master_muted(muted).await
    }

    /// Set the volume of every session whose name contains `query`.
    ///
    /// Returns the ids of the sessions changed; no match is not an error.
    ///
    /// # Errors
    /// Returns an error if the update cannot be delivered or the reply is invalid.
    pub async fn change_session_volume(
        &mut self,
        query: &str,
        volume: f64,
    ) -> ProtocolResult<Vec<String>> {
        let patches = volume_patches(&self.state.default_device.sessions, query, volume);
        let update = UpdateDocument::sessions(self.version(), self.device_id(), patches);
        self.push(update).await.map(|outcome| outcome.changed_sessions)
    }

    /// Flip the mute state of every session whose name contains `query`.
    ///
    /// Returns the ids of the sessions changed; no match is not an error.
    ///
    /// # Errors
    /// Returns an error if the update cannot be delivered or the reply is invalid.
    pub async fn toggle_session_mute(&mut self, query: &str) -> ProtocolResult<Vec<String>> {
        let patches = mute_toggle_patches(&self.state.default_device.sessions, query);
        let update = UpdateDocument::sessions(self.version(), self.device_id(), patches);
        self.push(update).await.map(|outcome| outcome.changed_sessions)
    }

    /// Close the connection.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be shut down cleanly.
    pub async fn disconnect(mut self) -> ProtocolResult<()> {
        SinkExt::<UpdateDocument>::close(&mut self.framed).await
    }

    fn device_id(&self) -> DeviceId {
        self.state.default_device.device_id.clone()
    }

    async fn push(&mut self, update: UpdateDocument) -> ProtocolResult<Reconciled> {
        let outcome = self.reconciler.apply(&mut self.state, &update)?;
        debug!(category = %outcome.category, "Pushing update");
        self.framed.send(update).await?;

        let version = self.version();
        self.state = read_state(&mut self.framed, self.reply_timeout, version).await?;
        Ok(outcome)
    }
}

async fn read_state<S>(
    framed: &mut Framed<S, JsonLineCodec>,
    limit: Option<Duration>,
    version: ProtocolVersion,
) -> ProtocolResult<FullState>
where
    S: AsyncRead + Unpin,
{
    let frame = next_frame(framed, limit).await?.ok_or(ProtocolError::ConnectionClosed)?;
    Ok(FullState::from_value(frame, version)?)
}
