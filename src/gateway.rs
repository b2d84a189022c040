use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use auth::TokenDecoder;
use net::protocol::{close, ClientMessage, ServerMessage};
use net::OutboundFrame;
use room::{InputMessage, JoinError, RoomRegistry};
use session::{SessionContext, SessionId};

use crate::config::SecuritySection;

/// Shared state for the WebSocket handlers.
#[derive(Clone)]
pub struct GatewayState {
    registry: Arc<RoomRegistry>,
    auth: Arc<dyn TokenDecoder>,
    security: SecuritySection,
    next_session_id: Arc<AtomicU64>,
    connections: Arc<AtomicUsize>,
}

impl GatewayState {
    pub fn new(
        registry: Arc<RoomRegistry>,
        auth: Arc<dyn TokenDecoder>,
        security: SecuritySection,
    ) -> Self {
        Self {
            registry,
            auth,
            security,
            next_session_id: Arc::new(AtomicU64::new(1)),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Build the gateway router. `/ws` handles WebSocket upgrades.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .with_state(state)
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: GatewayState) {
    let session_id = SessionId(state.next_session_id.fetch_add(1, Ordering::Relaxed));

    let active = state.connections.fetch_add(1, Ordering::Relaxed);
    if active >= state.security.max_connections {
        tracing::warn!(%session_id, active, "connection refused: server full");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close::GENERIC,
                reason: "server full".into(),
            })))
            .await;
        state.connections.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    tracing::info!(%session_id, "new connection");
    run_session(socket, &state, session_id).await;
    state.connections.fetch_sub(1, Ordering::Relaxed);
    tracing::info!(%session_id, "session ended");
}

async fn run_session(socket: WebSocket, state: &GatewayState, session_id: SessionId) {
    let (mut writer, mut reader) = socket.split();

    // The first frame must be the join envelope.
    let (token, world_save_id, character_name) = loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => {
                if text.len() > state.security.max_frame_bytes {
                    tracing::warn!(%session_id, len = text.len(), "oversized frame before join");
                    send_close(&mut writer, close::GENERIC, "frame too large").await;
                    return;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join {
                        token,
                        world_save_id,
                        character_name,
                    }) => break (token, world_save_id, character_name),
                    Ok(_) => {
                        tracing::warn!(%session_id, "expected join envelope first");
                        send_close(&mut writer, close::GENERIC, "join required").await;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(%session_id, error = %e, "malformed join envelope");
                        send_close(&mut writer, close::GENERIC, "malformed join").await;
                        return;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(%session_id, error = %e, "read error before join");
                return;
            }
        }
    };

    let claims = match state.auth.decode(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(%session_id, error = %e, "token rejected");
            send_close(&mut writer, close::AUTH_FAILED, "authentication failed").await;
            return;
        }
    };

    let ctx = SessionContext {
        session_id,
        account_id: claims.account_id,
        email: claims.email,
        character_name,
    };

    let (client_tx, mut client_rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = match state.registry.join(world_save_id, ctx, client_tx.clone()).await {
        Ok(handle) => handle,
        Err(e) => {
            let (code, reason) = join_close(&e);
            tracing::warn!(%session_id, world_save_id, error = %e, "join refused");
            send_close(&mut writer, code, reason).await;
            return;
        }
    };

    // Writer task: forward room frames as WS text frames, in emission order.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = client_rx.recv().await {
            match frame {
                OutboundFrame::Message(message) => {
                    let text = serde_json::to_string(&message).unwrap();
                    if writer.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    let _ = writer
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    // Reader loop: route INPUT to the room, answer pings inline.
    let mut consented = false;
    while let Some(result) = reader.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if text.len() > state.security.max_frame_bytes {
                    tracing::warn!(%session_id, len = text.len(), "oversized frame dropped");
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Input {
                        sequence_number,
                        direction,
                    }) => handle.input(
                        session_id,
                        InputMessage {
                            sequence_number,
                            direction,
                        },
                    ),
                    Ok(ClientMessage::Ping) => {
                        let _ = client_tx.send(OutboundFrame::Message(ServerMessage::Pong));
                    }
                    Ok(ClientMessage::Join { .. }) => {
                        tracing::debug!(%session_id, "duplicate join envelope ignored");
                    }
                    Err(e) => {
                        tracing::warn!(%session_id, error = %e, "malformed client message dropped");
                    }
                }
            }
            Ok(Message::Close(_)) => {
                consented = true;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "read error");
                break;
            }
        }
    }

    handle.leave(session_id, consented);
    writer_task.abort();
}

fn join_close(err: &JoinError) -> (u16, &'static str) {
    match err {
        JoinError::WorldNotFound => (close::WORLD_NOT_FOUND, "world not found"),
        JoinError::NotOwner => (close::NOT_OWNER, "only the owner may open this world"),
        JoinError::PartyFull => (close::GENERIC, "room is full"),
        JoinError::RoomClosed | JoinError::Persistence(_) => (close::GENERIC, "join failed"),
    }
}

async fn send_close(writer: &mut SplitSink<WebSocket, Message>, code: u16, reason: &'static str) {
    let _ = writer
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
