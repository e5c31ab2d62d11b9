use std::{error::Error as StdError, io};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bridge::{Inbound, LiveChannel, TransportError};
use tracing::debug;

/// [`LiveChannel`] over an upgraded axum WebSocket.
pub(crate) struct WsChannel {
    socket: WebSocket,
}

impl WsChannel {
    pub(crate) fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

/// Peer vanished without a close handshake: reset, broken pipe, EOF, or the
/// protocol layer reporting the same.
fn is_connection_lost(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if err.to_string().contains("without closing handshake") {
            return true;
        }
        current = err.source();
    }
    false
}

fn read_error(err: axum::Error) -> TransportError {
    let inner = err.into_inner();
    if is_connection_lost(inner.as_ref()) {
        TransportError::ConnectionLost(inner)
    } else {
        TransportError::Read(inner)
    }
}

#[async_trait]
impl LiveChannel for WsChannel {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let frame = match self.socket.recv().await? {
                Ok(Message::Text(text)) => Ok(Inbound::Text(text)),
                Ok(Message::Binary(bytes)) => Ok(Inbound::Binary(bytes)),
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        debug!(code = frame.code, reason = %frame.reason, "close frame received");
                    }
                    Ok(Inbound::Close)
                }
                Err(err) => Err(read_error(err)),
            };
            return Some(frame);
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Write(e.into_inner()))
    }

    async fn close(&mut self) {
        // the peer may already be gone
        let _ = self.socket.send(Message::Close(None)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "websocket io")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn reset_connections_count_as_lost() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(is_connection_lost(&reset));
        assert!(is_connection_lost(&Wrapped(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "eof"
        ))));
    }

    #[test]
    fn handshake_violation_message_counts_as_lost() {
        let err = io::Error::new(
            io::ErrorKind::Other,
            "Connection reset without closing handshake",
        );
        assert!(is_connection_lost(&err));
    }

    #[test]
    fn other_failures_are_read_errors() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "bad utf-8");
        assert!(!is_connection_lost(&err));
        let classified = read_error(axum::Error::new(err));
        assert!(!classified.is_expected_close());
    }
}
