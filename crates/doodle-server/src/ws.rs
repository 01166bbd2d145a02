use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use doodle_core::net::messages::ServerMessage;
use doodle_core::net::protocol::{decode_client_message, encode_server_message};
use doodle_core::participant::ParticipantId;
use doodle_core::room::{validate_display_name, validate_room_id};

use crate::coordinator::JoinError;
use crate::error::AppError;
use crate::rate_limit::RateLimiter;
use crate::room_loop::PlayerSender;
use crate::room_manager::RoomHandle;
use crate::state::{AppState, ConnectionGuard};

/// A room that shut down mid-join is replaced and the join retried.
const JOIN_ATTEMPTS: usize = 3;

pub async fn ws_handler(
    State(state): State<AppState>,
    Path((room_id, player_name)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    validate_room_id(&room_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let name =
        validate_display_name(&player_name).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(AppError::ServiceUnavailable(
            "too many connections".to_string(),
        ));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, name)))
}

async fn handle_socket(socket: WebSocket, state: AppState, room_id: String, name: String) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let joined = join_room(&state, &room_id, &name, &tx).await;
    drop(tx);
    let (room, participant) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            tracing::warn!(room = %room_id, player = %name, error = %e, "Join rejected");
            send_error(&mut ws_sender, &e.to_string()).await;
            let _ = ws_sender.send(Message::Close(None)).await;
            return;
        },
    };
    tracing::info!(room = %room_id, player = %name, participant, "Player connected");

    let mut send_task = spawn_writer(ws_sender, rx);
    let mut recv_task = {
        let state = state.clone();
        let room = room.clone();
        let room_id = room_id.clone();
        tokio::spawn(async move {
            read_loop(ws_receiver, &state, &room, &room_id, participant).await;
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    room.leave(participant);
    tracing::info!(room = %room_id, player = %name, participant, "Player disconnected");
}

async fn join_room(
    state: &AppState,
    room_id: &str,
    name: &str,
    tx: &PlayerSender,
) -> Result<(RoomHandle, ParticipantId), JoinError> {
    for _ in 0..JOIN_ATTEMPTS {
        let handle = {
            let mut rooms = state.rooms.write().await;
            rooms.get_or_create(room_id, &state.config, &state.rooms)
        };
        match handle.join(name.to_string(), tx.clone()).await {
            Ok(id) => return Ok((handle, id)),
            Err(JoinError::RoomClosed) => {
                tracing::debug!(room = %room_id, "Room closed during join, retrying");
                state
                    .rooms
                    .write()
                    .await
                    .remove_if_instance(room_id, handle.instance);
            },
            Err(e) => return Err(e),
        }
    }
    Err(JoinError::RoomClosed)
}

async fn send_error(ws_sender: &mut SplitSink<WebSocket, Message>, message: &str) {
    let msg = ServerMessage::Error {
        message: message.to_string(),
    };
    if let Ok(text) = encode_server_message(&msg)
        && let Err(e) = ws_sender.send(Message::Text(text.into())).await
    {
        tracing::warn!(error = %e, "Failed to send error frame");
    }
}

/// Drain the connection's queue onto the socket. Closes the socket once the
/// room drops its sender.
fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    })
}

async fn read_loop(
    mut ws_receiver: SplitStream<WebSocket>,
    state: &AppState,
    room: &RoomHandle,
    room_id: &str,
    participant: ParticipantId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    let max_size = state.config.limits.max_message_size;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(_) => {
                tracing::warn!(room = %room_id, participant, "Ignoring binary frame");
                continue;
            },
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(room = %room_id, participant, "Rate limited");
            continue;
        }

        let message = match decode_client_message(text.as_str(), max_size) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(room = %room_id, participant, error = %e, "Dropping invalid message");
                continue;
            },
        };

        if !room.send(participant, message) {
            break;
        }
    }
}
