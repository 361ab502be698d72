//! Read/write loop for one established WebSocket session.
//!
//! Pumps outbound frames handed over by the transport and forwards inbound
//! text frames to the manager until either side goes away.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use super::transport::TransportEvents;
use crate::error::TransportError;

/// Why a session loop returned.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Peer closed the socket or the stream ended.
    Closed,
    /// Read or write failed.
    Failed(TransportError),
    /// The outbound sender was dropped: nobody owns this transport anymore.
    Detached,
}

/// Runs the read/write loop for a single WebSocket session.
pub(crate) async fn run_session<S>(
    socket: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: &TransportEvents,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(text) = frame else {
                    let _ = ws_tx.close().await;
                    return SessionEnd::Detached;
                };
                if let Err(err) = ws_tx.send(Message::text(text)).await {
                    return SessionEnd::Failed(TransportError::Io(err.to_string()));
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => events.message(text),
                        Err(_) => tracing::warn!(len = bytes.len(), "dropping non-utf8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        return SessionEnd::Failed(TransportError::Io(err.to_string()));
                    }
                }
            }
        }
    }
}
