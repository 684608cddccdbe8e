//! Wire format for the /main channel: JSON text frames with a named event
//! and a data payload, `{"event": ..., "data": ...}`.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::db::models::UserProfile;

/// Client → server events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Authenticate { token: String },
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Server → client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Authenticated,
    AuthenticateFailed {
        error: String,
    },
    UserConnected(UserProfile),
    UserDisconnect {
        #[serde(rename = "socketId")]
        socket_id: String,
    },
}

impl ServerEvent {
    /// Encode as a text frame. None only if serialization fails, which is
    /// logged and the event skipped rather than tearing the socket down.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode server event");
                None
            }
        }
    }
}
