use std::sync::OnceLock;

use bcrypt::{hash, verify, DEFAULT_COST};
use rusqlite::Connection;

use crate::accounts::store;
use crate::db::models::User;
use crate::error::ApiError;

/// Hash a plaintext password for storage (bcrypt, salted).
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Hash verified against when the username does not exist, so both failure
/// paths cost one bcrypt verify. Same cost factor as stored hashes.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash("", DEFAULT_COST).unwrap_or_default())
}

/// Check a username/password pair against the users table.
///
/// Case-sensitive exact username match, then a bcrypt verify. A missing
/// user and a wrong password both cost one verify and fail identically —
/// the caller can only see "Invalid credentials"; the two cases are told
/// apart in debug logs only.
pub fn check_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    let user = store::find_by_username(conn, username)?;

    let user = match user {
        Some(user) => user,
        None => {
            let _ = verify(password, dummy_hash());
            tracing::debug!(username, "login rejected: unknown username");
            return Err(ApiError::Auth("Invalid credentials".to_string()));
        }
    };

    let ok = verify(password, &user.password_hash)?;
    if !ok {
        tracing::debug!(username, "login rejected: password mismatch");
        return Err(ApiError::Auth("Invalid credentials".to_string()));
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::store::{create_user, NewUser};
    use crate::db;

    fn seed_user(conn: &Connection) -> User {
        create_user(
            conn,
            NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: hash_password("hunter2").unwrap(),
                full_name: None,
                roles: vec!["user".to_string()],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let hashed = hash_password("s3cret").unwrap();
        assert!(verify("s3cret", &hashed).unwrap());
        assert!(!verify("wrong", &hashed).unwrap());
    }

    #[test]
    fn test_correct_credentials_pass() {
        let pool = db::init_memory_db();
        let conn = pool.lock().unwrap();
        let created = seed_user(&conn);

        let user = check_credentials(&conn, "alice", "hunter2").unwrap();
        assert_eq!(user.id, created.id);
    }

    #[test]
    fn test_dummy_hash_is_a_real_bcrypt_hash() {
        // The unknown-username path relies on this being verifiable, so the
        // burned work matches a genuine mismatch instead of erroring early.
        assert!(!verify("anything", dummy_hash()).unwrap());
        assert!(verify("", dummy_hash()).unwrap());
    }

    #[test]
    fn test_unknown_user_and_bad_password_fail_uniformly() {
        let pool = db::init_memory_db();
        let conn = pool.lock().unwrap();
        seed_user(&conn);

        let missing = check_credentials(&conn, "bob", "hunter2").unwrap_err();
        let wrong = check_credentials(&conn, "alice", "nope").unwrap_err();
        assert_eq!(missing.to_string(), "Invalid credentials");
        assert_eq!(wrong.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_username_match_is_case_sensitive() {
        let pool = db::init_memory_db();
        let conn = pool.lock().unwrap();
        seed_user(&conn);

        let err = check_credentials(&conn, "Alice", "hunter2").unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}
