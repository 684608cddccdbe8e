//! Actor-per-connection loop for the /main channel.
//!
//! A socket connects unauthenticated and stays that way until it sends an
//! `authenticate` event carrying a previously issued session token. Failed
//! handshakes only emit `authenticateFailed` — the socket is left open and
//! unauthenticated, with no timeout.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::accounts::store;
use crate::auth::token;
use crate::sessions;
use crate::state::AppState;
use crate::ws::protocol::{ClientEvent, ServerEvent};
use crate::ws::ConnectionSender;

/// Run the connection: split the socket into a writer task (owns the sink,
/// forwards frames from an mpsc channel) and a reader loop dispatching
/// incoming events.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let socket_id = uuid::Uuid::new_v4().to_string();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    tracing::info!(socket_id = %socket_id, "client connected");

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    handle_text_message(text.as_str(), &socket_id, &tx, &state).await;
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(socket_id = %socket_id, reason = ?frame, "client initiated close");
                    break;
                }
                // Binary frames and pongs are not part of the protocol
                _ => {}
            },
            Some(Err(e)) => {
                tracing::warn!(socket_id = %socket_id, error = %e, "websocket receive error");
                break;
            }
            None => {
                tracing::info!(socket_id = %socket_id, "websocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();

    // Remove the registry entry (if the socket ever authenticated) and
    // tell everyone else.
    state.clients.detach(&socket_id);
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

async fn handle_text_message(
    text: &str,
    socket_id: &str,
    tx: &ConnectionSender,
    state: &AppState,
) {
    match ClientEvent::parse(text) {
        Ok(ClientEvent::Authenticate { token }) => {
            authenticate(socket_id, tx, state, token).await;
        }
        Err(err) => {
            tracing::debug!(
                socket_id,
                error = %err,
                "unrecognized websocket message: {}",
                text.chars().take(100).collect::<String>()
            );
        }
    }
}

/// The `authenticate` handshake: session lookup by token, then token
/// verification, then user lookup by the verified claims. Each failure
/// reports a reason and leaves the socket connected.
pub async fn authenticate(socket_id: &str, tx: &ConnectionSender, state: &AppState, token: String) {
    // The session must exist before the token's own claims are considered.
    let db = state.db.clone();
    let lookup_token = token.clone();
    let session = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        sessions::find_by_token(&conn, &lookup_token).ok().flatten()
    })
    .await
    .ok()
    .flatten();

    if session.is_none() {
        return auth_failed(socket_id, tx, state, "Session not found".to_string());
    }

    let claims = match token::verify_token(&state.jwt_secret, &token) {
        Ok(claims) => claims,
        Err(err) => {
            return auth_failed(socket_id, tx, state, err.to_string());
        }
    };

    let db = state.db.clone();
    let user_id = claims.sub.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        store::find_by_id(&conn, &user_id).ok().flatten()
    })
    .await
    .ok()
    .flatten();

    let Some(user) = user else {
        return auth_failed(socket_id, tx, state, "User not found".to_string());
    };

    state.clients.attach(socket_id, tx.clone(), user.profile());
    send_event(tx, &ServerEvent::Authenticated);

    tracing::info!(socket_id, user_id = %claims.sub, "socket authenticated");
}

/// Mirror of the original failure path: drop any prior attachment for this
/// socket, then report the reason. The socket itself stays open.
fn auth_failed(socket_id: &str, tx: &ConnectionSender, state: &AppState, error: String) {
    tracing::debug!(socket_id, error = %error, "socket authentication failed");
    state.clients.detach(socket_id);
    send_event(
        tx,
        &ServerEvent::AuthenticateFailed { error },
    );
}

fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Some(msg) = event.to_message() {
        let _ = tx.send(msg);
    }
}
