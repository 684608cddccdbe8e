//! In-memory registry of authenticated WebSocket clients.
//!
//! Owned by the server state and passed by reference to handlers — never a
//! global. Entries are ordered by attachment so broadcasts deliver in
//! registration order. At most one entry exists per socket id; a user may
//! hold several entries at once (multi-device). Nothing here is persistent.

use std::sync::{Arc, Mutex};

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::mpsc;

use crate::db::models::UserProfile;
use crate::ws::protocol::ServerEvent;

/// Sender half of a connection's channel. Cloning it lets any part of the
/// system push frames to that client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Close code sent when an attach replaces an existing entry.
const CLOSE_REPLACED: u16 = 4000;

#[derive(Debug, Clone)]
pub struct ClientEntry {
    pub socket_id: String,
    pub user_id: String,
    pub sender: ConnectionSender,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<Vec<ClientEntry>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated socket. Any existing entry for the same
    /// socket id is force-closed and replaced. The new entry is inserted
    /// before the `userConnected` broadcast, so the new socket hears its
    /// own arrival.
    pub fn attach(&self, socket_id: &str, sender: ConnectionSender, user: UserProfile) {
        let user_id = user.id.clone();
        let event = ServerEvent::UserConnected(user.clone());

        {
            let mut clients = self.lock();
            if let Some(pos) = clients.iter().position(|c| c.socket_id == socket_id) {
                let prior = clients.remove(pos);
                close_sender(&prior.sender);
                tracing::debug!(socket_id, "replaced existing registry entry");
            }
            clients.push(ClientEntry {
                socket_id: socket_id.to_string(),
                user_id: user_id.clone(),
                sender,
                user,
            });
        }

        tracing::info!(socket_id, user_id = %user_id, "client attached");
        self.broadcast(&event);
    }

    /// Remove a socket's entry, force-closing its connection. Broadcasts
    /// `userDisconnect` only when an entry was actually removed. Detaching
    /// an unknown socket id is a no-op.
    pub fn detach(&self, socket_id: &str) -> bool {
        let removed = {
            let mut clients = self.lock();
            match clients.iter().position(|c| c.socket_id == socket_id) {
                Some(pos) => {
                    let prior = clients.remove(pos);
                    close_sender(&prior.sender);
                    true
                }
                None => false,
            }
        };

        if removed {
            tracing::info!(socket_id, "client detached");
            self.broadcast(&ServerEvent::UserDisconnect {
                socket_id: socket_id.to_string(),
            });
        }

        removed
    }

    /// Linear scan by socket id. None when absent — never panics.
    pub fn find_user_id(&self, socket_id: &str) -> Option<String> {
        self.lock()
            .iter()
            .find(|c| c.socket_id == socket_id)
            .map(|c| c.user_id.clone())
    }

    /// Socket ids currently attached for a user, in registration order.
    pub fn sockets_for_user(&self, user_id: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.socket_id.clone())
            .collect()
    }

    /// Deliver an event to every registered socket, sequentially in
    /// registration order.
    pub fn broadcast(&self, event: &ServerEvent) {
        let Some(msg) = event.to_message() else {
            return;
        };

        let senders: Vec<ConnectionSender> =
            self.lock().iter().map(|c| c.sender.clone()).collect();
        for sender in senders {
            // A closed channel means the client is already gone; its actor
            // will detach it.
            let _ = sender.send(msg.clone());
        }
    }

    /// Deliver an event to every connection of one user.
    pub fn send_to_user(&self, user_id: &str, event: &ServerEvent) {
        let Some(msg) = event.to_message() else {
            return;
        };

        let senders: Vec<ConnectionSender> = self
            .lock()
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.sender.clone())
            .collect();
        for sender in senders {
            let _ = sender.send(msg.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ClientEntry>> {
        // A poisoned lock only means another thread panicked mid-mutation;
        // the Vec itself is still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn close_sender(sender: &ConnectionSender) {
    let frame = CloseFrame {
        code: CLOSE_REPLACED,
        reason: "Connection replaced".into(),
    };
    let _ = sender.send(Message::Close(Some(frame)));
}
