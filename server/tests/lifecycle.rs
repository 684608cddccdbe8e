//! End-to-end lifecycle tests through the library crate: registration,
//! login, logout, and the WebSocket authenticate handshake.

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use atrium_server::accounts::store::{self, NewUser};
use atrium_server::auth::{password, token};
use atrium_server::db;
use atrium_server::error::is_unique_violation;
use atrium_server::sessions;
use atrium_server::state::AppState;
use atrium_server::ws::{actor, ClientRegistry};

const SECRET: &[u8] = &[42u8; 32];

fn test_state() -> AppState {
    AppState {
        db: db::init_memory_db(),
        jwt_secret: SECRET.to_vec(),
        token_lifetime_secs: 3600,
        clients: ClientRegistry::new(),
    }
}

fn register_user(state: &AppState, username: &str, pass: &str) -> String {
    let conn = state.db.lock().unwrap();
    store::create_user(
        &conn,
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: password::hash_password(pass).unwrap(),
            full_name: None,
            roles: vec!["user".to_string()],
        },
    )
    .unwrap()
    .id
}

/// Log in the way the /auth handler does: check credentials, mint a token,
/// persist the session.
fn login(state: &AppState, username: &str, pass: &str) -> String {
    let conn = state.db.lock().unwrap();
    let user = password::check_credentials(&conn, username, pass).unwrap();
    let token = token::issue_token(SECRET, &user.id, &user.username, 3600).unwrap();
    sessions::create_session(&conn, &token, &user.id).unwrap();
    token
}

fn recv_events(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(text) = msg {
            events.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    events
}

#[test]
fn register_twice_fails_then_login_succeeds() {
    let state = test_state();
    register_user(&state, "alice", "hunter2");

    // Second registration with the same username is rejected
    let conn = state.db.lock().unwrap();
    let err = store::create_user(
        &conn,
        NewUser {
            username: "alice".to_string(),
            email: "other@example.com".to_string(),
            password_hash: "x".to_string(),
            full_name: None,
            roles: vec![],
        },
    )
    .unwrap_err();
    assert!(is_unique_violation(&err));

    // First registration still logs in with the correct password
    let user = password::check_credentials(&conn, "alice", "hunter2").unwrap();
    assert_eq!(user.username, "alice");
}

#[test]
fn issued_token_verifies_and_session_is_deleted_once() {
    let state = test_state();
    let user_id = register_user(&state, "alice", "hunter2");
    let tok = login(&state, "alice", "hunter2");

    // Fresh token verifies, claims point at the owning user
    let claims = token::verify_token(SECRET, &tok).unwrap();
    assert_eq!(claims.sub, user_id);

    // Logout deletes exactly the session matching (token, user_id) from
    // the verified token; a second logout is a no-op, not an error.
    let conn = state.db.lock().unwrap();
    assert!(sessions::find_by_token(&conn, &tok).unwrap().is_some());
    assert_eq!(sessions::delete_session(&conn, &tok, &claims.sub).unwrap(), 1);
    assert_eq!(sessions::delete_session(&conn, &tok, &claims.sub).unwrap(), 0);
    assert!(sessions::find_by_token(&conn, &tok).unwrap().is_none());
}

#[tokio::test]
async fn handshake_with_unknown_token_reports_session_not_found() {
    let state = test_state();
    let (tx, mut rx) = mpsc::unbounded_channel();

    actor::authenticate("sock-1", &tx, &state, "no-such-token".to_string()).await;

    let events = recv_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "authenticateFailed");
    assert_eq!(events[0]["data"]["error"], "Session not found");
    // No registry entry was created
    assert!(state.clients.is_empty());
}

#[tokio::test]
async fn handshake_with_valid_session_attaches_and_notifies() {
    let state = test_state();
    register_user(&state, "alice", "hunter2");
    let tok = login(&state, "alice", "hunter2");
    let (tx, mut rx) = mpsc::unbounded_channel();

    actor::authenticate("sock-1", &tx, &state, tok).await;

    let events = recv_events(&mut rx);
    // Attach broadcasts userConnected (the new socket included), then the
    // handshake confirms with authenticated.
    let names: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["userConnected", "authenticated"]);
    assert_eq!(events[0]["data"]["username"], "alice");

    let user_id = state.clients.find_user_id("sock-1").unwrap();
    assert_eq!(
        state.clients.sockets_for_user(&user_id),
        vec!["sock-1".to_string()]
    );
}

#[tokio::test]
async fn handshake_with_expired_token_reports_verification_error() {
    let state = test_state();
    let user_id = register_user(&state, "alice", "hunter2");

    // A session row exists but the token itself is expired
    let now = chrono::Utc::now().timestamp();
    let claims = token::Claims {
        sub: user_id,
        username: "alice".to_string(),
        iat: now - 7200,
        exp: now - 60,
    };
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET),
    )
    .unwrap();
    {
        let conn = state.db.lock().unwrap();
        sessions::create_session(&conn, &expired, &claims.sub).unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    actor::authenticate("sock-1", &tx, &state, expired).await;

    let events = recv_events(&mut rx);
    assert_eq!(events[0]["event"], "authenticateFailed");
    assert!(events[0]["data"]["error"]
        .as_str()
        .unwrap()
        .contains("Expired"));
    assert!(state.clients.is_empty());
}

#[tokio::test]
async fn handshake_for_deleted_user_reports_user_not_found() {
    let state = test_state();
    let user_id = register_user(&state, "alice", "hunter2");
    let tok = login(&state, "alice", "hunter2");

    // Remove the user while the session still exists
    {
        let conn = state.db.lock().unwrap();
        conn.execute("DELETE FROM users WHERE id = ?1", [&user_id])
            .unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    actor::authenticate("sock-1", &tx, &state, tok).await;

    let events = recv_events(&mut rx);
    assert_eq!(events[0]["event"], "authenticateFailed");
    assert_eq!(events[0]["data"]["error"], "User not found");
    assert!(state.clients.is_empty());
}

#[tokio::test]
async fn reauthenticating_another_user_replaces_the_entry() {
    let state = test_state();
    register_user(&state, "alice", "hunter2");
    register_user(&state, "bob", "swordfish");
    let tok_alice = login(&state, "alice", "hunter2");
    let tok_bob = login(&state, "bob", "swordfish");

    let (tx_old, mut rx_old) = mpsc::unbounded_channel();
    actor::authenticate("sock-1", &tx_old, &state, tok_alice).await;

    let (tx_new, _rx_new) = mpsc::unbounded_channel();
    actor::authenticate("sock-1", &tx_new, &state, tok_bob).await;

    // One entry for the socket id, now owned by bob
    assert_eq!(state.clients.len(), 1);
    let owner = state.clients.find_user_id("sock-1").unwrap();
    let conn = state.db.lock().unwrap();
    let bob = atrium_server::accounts::store::find_by_username(&conn, "bob")
        .unwrap()
        .unwrap();
    assert_eq!(owner, bob.id);

    // The prior underlying connection was closed
    let mut saw_close = false;
    while let Ok(msg) = rx_old.try_recv() {
        if matches!(msg, Message::Close(_)) {
            saw_close = true;
        }
    }
    assert!(saw_close);
}
