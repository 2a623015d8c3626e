//! One socket from accept to close.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::connection::{ClientConnection, LifecycleEvent, Outbound, new_connection_id};
use super::handler::MessageRouter;
use super::hub::LiveHub;
use crate::protocol::ServerMessage;

/// How long the writer gets to flush its close frame.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Run a session for an upgraded socket.
///
/// 1. Registers the connection and queues `welcome`
/// 2. Forwards queued frames to the socket until terminated
/// 3. Routes inbound frames and records pongs
/// 4. Disconnects through the hub, whichever side ended first
#[instrument(skip_all, fields(conn_id))]
pub async fn run_session(socket: WebSocket, hub: Arc<LiveHub>, send_queue_capacity: usize) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(new_connection_id(), tx));
    let _ = tracing::Span::current().record("conn_id", connection.id.as_str());

    if !hub.admit(connection.clone()) {
        return;
    }
    let _ = connection.send_message(&ServerMessage::Welcome);

    let cancel = connection.cancellation();
    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                frame = rx.recv() => {
                    let message = match frame {
                        Some(Outbound::Text(text)) => Message::Text(text.as_str().into()),
                        Some(Outbound::Ping) => Message::Ping(Vec::new().into()),
                        None => break,
                    };
                    if let Err(e) = ws_tx.send(message).await {
                        debug!(error = %e, "socket write failed");
                        writer_cancel.cancel();
                        break;
                    }
                }
            }
        }
    });

    let router = MessageRouter::new(hub.clone());
    let mut ending = LifecycleEvent::Drained;
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => {
                // Still open means the writer gave up, not a hub termination.
                if connection.is_open() {
                    ending = LifecycleEvent::TransportError;
                }
                break;
            }
            frame = ws_rx.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                let _ = router.route(&connection, text.as_str());
            }
            Some(Ok(Message::Binary(data))) => {
                let _ = router.route_bytes(&connection, &data);
            }
            Some(Ok(Message::Pong(_))) => connection.mark_alive(),
            Some(Ok(Message::Ping(_))) => {}
            Some(Ok(Message::Close(_))) => {
                let _ = hub.disconnect(&connection, LifecycleEvent::PeerClose);
                break;
            }
            Some(Err(e)) => {
                warn!(error = %e, "socket read failed");
                ending = LifecycleEvent::TransportError;
                break;
            }
            None => break,
        }
    }

    let _ = hub.disconnect(&connection, ending);
    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        abort.abort();
    }
}
