//! Per-connection receive loop: press → snapshot lookup → activation → ack.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::ButtonIndex,
    protocol::{ButtonAck, ButtonPress},
};
use tracing::{debug, error, info, warn};

use crate::{
    config_store::ConfigStore,
    error::{AuthError, DispatchError, ProtocolError, TransportError},
    scheduler::NoteScheduler,
    session::SessionStore,
};

/// A data frame read from the live channel. Control frames (ping/pong) are
/// handled by the transport and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Message-oriented duplex channel provided by the transport layer.
#[async_trait]
pub trait LiveChannel: Send {
    /// Next data frame; `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// Proof that a connection presented a valid session token at open time.
/// Only [`EventDispatcher::authenticate`] creates one.
#[derive(Debug)]
pub struct AuthorizedSession {
    _private: (),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    StreamEnded,
    ReadError,
    WriteError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub acknowledged: u64,
    pub dropped: u64,
    pub failed_activations: u64,
}

struct Connection<C: LiveChannel> {
    channel: C,
    state: ConnectionState,
}

impl<C: LiveChannel> Connection<C> {
    async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.channel.close().await;
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    config: Arc<ConfigStore>,
    sessions: Arc<SessionStore>,
    scheduler: Arc<NoteScheduler>,
}

impl EventDispatcher {
    pub fn new(
        config: Arc<ConfigStore>,
        sessions: Arc<SessionStore>,
        scheduler: Arc<NoteScheduler>,
    ) -> Self {
        Self {
            config,
            sessions,
            scheduler,
        }
    }

    /// Checks the token carried by the handshake. On failure the transport
    /// must refuse the upgrade.
    pub fn authenticate(&self, token: Option<&str>) -> Result<AuthorizedSession, AuthError> {
        match token {
            Some(token) if self.sessions.validate_token(token) => {
                Ok(AuthorizedSession { _private: () })
            }
            _ => Err(AuthError::InvalidToken),
        }
    }

    /// Decodes one frame, resolves it against the current snapshot and
    /// activates the note. Returns the acknowledgment to send.
    pub async fn handle_frame(&self, frame: &[u8]) -> Result<ButtonAck, DispatchError> {
        let press: ButtonPress = serde_json::from_slice(frame).map_err(ProtocolError::from)?;

        // fresh per press so a reload applies to the very next one
        let snapshot = self.config.get();
        let index = ButtonIndex::checked(press.button_index, snapshot.midi.buttons.len())
            .ok_or(ProtocolError::IndexOutOfRange {
                index: press.button_index,
                available: snapshot.midi.buttons.len(),
            })?;
        let button = &snapshot.midi.buttons[index.get()];
        let velocity = button.effective_velocity(snapshot.midi.velocity);

        self.scheduler
            .activate(snapshot.midi.channel, button.note, velocity, snapshot.midi.hold)
            .await?;
        info!(
            button_index = index.get(),
            note = %button.note,
            %velocity,
            label = %button.label,
            "button pressed"
        );
        Ok(ButtonAck::ok(press.button_index, button.note))
    }

    /// Runs the receive loop until the peer leaves or the channel breaks.
    /// A bad frame or a failed activation never ends the connection.
    pub async fn serve<C: LiveChannel>(
        &self,
        _auth: AuthorizedSession,
        channel: C,
        peer: &str,
    ) -> (CloseReason, ConnectionStats) {
        let mut conn = Connection {
            channel,
            state: ConnectionState::Open,
        };
        let mut stats = ConnectionStats::default();
        info!(%peer, "live connection opened");

        let reason = loop {
            let frame = match conn.channel.recv().await {
                None => break CloseReason::StreamEnded,
                Some(Ok(Inbound::Close)) => break CloseReason::ClientClosed,
                Some(Ok(Inbound::Text(text))) => text.into_bytes(),
                Some(Ok(Inbound::Binary(bytes))) => bytes,
                Some(Err(err)) => {
                    if err.is_expected_close() {
                        debug!(%peer, error = %err, "live connection dropped");
                    } else {
                        warn!(%peer, error = %err, "live connection read error");
                    }
                    break CloseReason::ReadError;
                }
            };

            let ack = match self.handle_frame(&frame).await {
                Ok(ack) => ack,
                Err(DispatchError::Protocol(err)) => {
                    stats.dropped += 1;
                    warn!(%peer, error = %err, "dropping frame");
                    continue;
                }
                Err(DispatchError::Device(err)) => {
                    stats.failed_activations += 1;
                    error!(%peer, error = %err, "failed to send note");
                    continue;
                }
            };

            let payload = match serde_json::to_string(&ack) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(%peer, error = %err, "failed to encode acknowledgment");
                    continue;
                }
            };
            if let Err(err) = conn.channel.send_text(payload).await {
                warn!(%peer, error = %err, "failed to send acknowledgment");
                break CloseReason::WriteError;
            }
            stats.acknowledged += 1;
        };

        conn.close().await;
        info!(%peer, ?reason, acknowledged = stats.acknowledged, "live connection closed");
        (reason, stats)
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
