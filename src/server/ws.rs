//! WebSocket push connections
//!
//! A display board connects to `/ws/{kd_display}`, a room's calling screen
//! to `/ws/antrian/{kd_ruang_poli}`. Each connection is registered, sent a
//! handshake, then fed frames from its registry queue. Inbound messages are
//! ignored; a read error, a close frame or a failed write ends the session
//! and removes the connection.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{Sink, SinkExt, Stream, StreamExt};

use super::state::AppState;
use crate::registry::{BroadcastFrame, CallMessage, ConnectionRegistry, ConnectionScope};
use crate::store::QueueStore;
use crate::tts::SpeechSynthesizer;

pub async fn display_socket<S: QueueStore, V: SpeechSynthesizer>(
    ws: WebSocketUpgrade,
    Path(display_code): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState<S, V>>,
) -> Response {
    upgrade(ws, ConnectionScope::Display(display_code), peer, state)
}

pub async fn room_socket<S: QueueStore, V: SpeechSynthesizer>(
    ws: WebSocketUpgrade,
    Path(room_code): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState<S, V>>,
) -> Response {
    upgrade(ws, ConnectionScope::Room(room_code), peer, state)
}

fn upgrade<S: QueueStore, V: SpeechSynthesizer>(
    ws: WebSocketUpgrade,
    scope: ConnectionScope,
    peer: SocketAddr,
    state: AppState<S, V>,
) -> Response {
    let Some(slot) = state.acquire_connection() else {
        tracing::warn!(peer = %peer, scope = %scope, "Connection rejected: limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };

    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket: WebSocket| async move {
        let _slot = slot;
        let (writer, reader) = socket.split();
        run_session(registry, scope, Some(peer), writer, reader).await;
    })
}

/// Drive one push connection until it fails or closes
pub async fn run_session<W, R, E>(
    registry: Arc<ConnectionRegistry>,
    scope: ConnectionScope,
    peer: Option<SocketAddr>,
    mut writer: W,
    mut reader: R,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut registration = registry.register(scope.clone(), peer).await;
    let id = registration.id;

    match BroadcastFrame::from_message(&CallMessage::handshake(&scope)) {
        Ok(handshake) => {
            if let Err(e) = registry.send_to(id, handshake).await {
                tracing::debug!(connection = %id, error = %e, "Handshake not queued");
            }
        }
        Err(e) => {
            tracing::error!(connection = %id, error = %e, "Failed to encode handshake");
        }
    }

    loop {
        tokio::select! {
            frame = registration.rx.recv() => {
                // None: the registry dropped this connection
                let Some(frame) = frame else { break };
                if let Err(e) = writer.send(Message::Text(frame.as_text().into())).await {
                    tracing::debug!(connection = %id, error = %e, "Write failed");
                    break;
                }
            }
            inbound = reader.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection = %id, error = %e, "Read failed");
                    break;
                }
            },
        }
    }

    registry.unregister(id).await;
    let _ = writer.close().await;
    tracing::debug!(connection = %id, scope = %scope, "Push connection closed");
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use futures::channel::mpsc;

    use super::*;

    fn text(message: &Message) -> CallMessage {
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_handshake_and_broadcast() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (writer, mut written) = mpsc::unbounded::<Message>();
        let (inbound, reader) = mpsc::unbounded::<Result<Message, Infallible>>();

        let session = tokio::spawn(run_session(
            Arc::clone(&registry),
            ConnectionScope::Display("D1".into()),
            None,
            writer,
            reader,
        ));

        let handshake = text(&written.next().await.unwrap());
        assert_eq!(handshake.patient_name, "Connected");
        assert_eq!(handshake.room_code, "INITIAL");
        assert_eq!(handshake.queue_number, "0");
        assert_eq!(handshake.display_code, "D1");
        assert_eq!(registry.connection_count().await, 1);

        let call = CallMessage {
            patient_name: "Budi".into(),
            room_code: "R1".into(),
            queue_number: "007".into(),
            display_code: "D1".into(),
            ..Default::default()
        };
        let frame = BroadcastFrame::from_message(&call).unwrap();
        registry.broadcast(&frame, Default::default()).await;
        assert_eq!(text(&written.next().await.unwrap()), call);

        drop(inbound);
        session.await.unwrap();
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_session_handshake() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (writer, mut written) = mpsc::unbounded::<Message>();
        let (inbound, reader) = mpsc::unbounded::<Result<Message, Infallible>>();

        let session = tokio::spawn(run_session(
            Arc::clone(&registry),
            ConnectionScope::Room("R1".into()),
            None,
            writer,
            reader,
        ));

        let handshake = text(&written.next().await.unwrap());
        assert_eq!(handshake.room_code, "R1");
        assert_eq!(handshake.display_code, "");

        inbound.unbounded_send(Ok(Message::Close(None))).unwrap();
        session.await.unwrap();
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_read_error_ends_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (writer, _written) = mpsc::unbounded::<Message>();
        let (inbound, reader) = mpsc::unbounded::<Result<Message, String>>();

        let session = tokio::spawn(run_session(
            Arc::clone(&registry),
            ConnectionScope::Display("D1".into()),
            None,
            writer,
            reader,
        ));

        inbound
            .unbounded_send(Ok(Message::Text("ping".into())))
            .unwrap();
        inbound.unbounded_send(Err("reset by peer".into())).unwrap();
        session.await.unwrap();
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_write_failure_ends_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (writer, written) = mpsc::unbounded::<Message>();
        let (_inbound, reader) = mpsc::unbounded::<Result<Message, Infallible>>();
        drop(written);

        run_session(
            Arc::clone(&registry),
            ConnectionScope::Display("D1".into()),
            None,
            writer,
            reader,
        )
        .await;
        assert_eq!(registry.connection_count().await, 0);
    }
}
