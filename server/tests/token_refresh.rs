//! Integration tests for the token regeneration layer: aged tokens get a
//! replacement in the `regenerated_token` header, young tokens do not, and
//! logout never does.

use tokio::net::TcpListener;

use atrium_server::accounts::store::{self, NewUser};
use atrium_server::auth::{password, token};
use atrium_server::db;
use atrium_server::routes;
use atrium_server::sessions;
use atrium_server::state::AppState;
use atrium_server::ws::ClientRegistry;

const SECRET: &[u8] = &[42u8; 32];

/// Start the real router on a random port and return the base URL plus the
/// state, so tests can inspect the session table directly.
async fn start_test_server() -> (String, AppState) {
    let state = AppState {
        db: db::init_memory_db(),
        jwt_secret: SECRET.to_vec(),
        token_lifetime_secs: 3600,
        clients: ClientRegistry::new(),
    };

    let storage_dir = tempfile::tempdir().unwrap();
    let app = routes::build_router(state.clone(), storage_dir.path().to_str().unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        // Keep the storage dir alive for the server's lifetime
        let _keep = storage_dir;
    });

    (format!("http://{addr}"), state)
}

/// Create a user and a persisted session whose token carries the given
/// issued-at/expiry offsets from now.
fn seed_session(state: &AppState, iat_offset: i64, exp_offset: i64) -> (String, String) {
    let conn = state.db.lock().unwrap();
    let user = store::create_user(
        &conn,
        NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: password::hash_password("hunter2").unwrap(),
            full_name: None,
            roles: vec!["user".to_string()],
        },
    )
    .unwrap();

    let now = chrono::Utc::now().timestamp();
    let claims = token::Claims {
        sub: user.id.clone(),
        username: "alice".to_string(),
        iat: now + iat_offset,
        exp: now + exp_offset,
    };
    let tok = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET),
    )
    .unwrap();
    sessions::create_session(&conn, &tok, &user.id).unwrap();

    (tok, user.id)
}

fn session_count(state: &AppState, user_id: &str) -> i64 {
    let conn = state.db.lock().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[tokio::test]
async fn aged_token_gets_a_replacement_with_persisted_session() {
    let (base_url, state) = start_test_server().await;
    // Issued 3000 s ago with 600 s left: well past half of the lifetime
    let (tok, user_id) = seed_session(&state, -3000, 600);

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base_url}/selfUserData"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let fresh = resp
        .headers()
        .get("regenerated_token")
        .expect("expected a replacement token")
        .to_str()
        .unwrap()
        .to_string();

    // The replacement verifies, belongs to the same user, and has a full
    // lifetime ahead of it
    let claims = token::verify_token(SECRET, &fresh).unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.exp - claims.iat, 3600);

    // Both the old and the replacement session are live
    assert_eq!(session_count(&state, &user_id), 2);
    let conn = state.db.lock().unwrap();
    assert!(sessions::find_by_token(&conn, &fresh).unwrap().is_some());
    assert!(sessions::find_by_token(&conn, &tok).unwrap().is_some());
}

#[tokio::test]
async fn young_token_is_not_regenerated() {
    let (base_url, state) = start_test_server().await;
    let (tok, user_id) = seed_session(&state, 0, 3600);

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base_url}/selfUserData"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("regenerated_token").is_none());
    assert_eq!(session_count(&state, &user_id), 1);
}

#[tokio::test]
async fn logout_with_aged_token_ends_the_session_for_good() {
    let (base_url, state) = start_test_server().await;
    let (tok, user_id) = seed_session(&state, -3000, 600);

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base_url}/logout"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let headers = resp.headers().clone();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], true);

    // No replacement token was minted and no session row survives: the
    // only way back in is a fresh login.
    assert!(headers.get("regenerated_token").is_none());
    assert_eq!(session_count(&state, &user_id), 0);
}
