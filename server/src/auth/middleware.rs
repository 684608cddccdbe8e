use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::token::{self, Claims};
use crate::error::ApiError;
use crate::sessions;
use crate::state::AppState;

/// Token signing secret stored in request extensions for the extractor.
/// Injected by [`inject_token_secret`] ahead of routing.
#[derive(Clone)]
pub struct TokenSecret(pub Vec<u8>);

/// Verified bearer token for the current request.
/// Keeps the raw token alongside the claims: logout deletes the session
/// matching the exact token string, derived here and never from the body.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Auth("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Auth("Expected Bearer token".to_string()))?;

        let secret = parts
            .extensions
            .get::<TokenSecret>()
            .ok_or_else(|| ApiError::Internal("token secret not injected".to_string()))?;

        let claims = token::verify_token(&secret.0, token)
            .map_err(|e| ApiError::Auth(e.to_string()))?;

        Ok(AuthContext {
            claims,
            token: token.to_string(),
        })
    }
}

/// Inject the token secret into request extensions so the AuthContext
/// extractor can find it.
pub async fn inject_token_secret(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    req.extensions_mut()
        .insert(TokenSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Response layer for authenticated routes: once the presented token is past
/// half of its lifetime, mint a replacement, persist its session, and hand
/// it back in a `regenerated_token` header. The old session stays valid
/// until logout or expiry. `/logout` is routed around this layer so ending a
/// session never mints a replacement.
pub async fn regenerate_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let claims = presented
        .as_deref()
        .and_then(|t| token::verify_token(&state.jwt_secret, t).ok());

    let mut res = next.run(req).await;

    let Some(claims) = claims else {
        return res;
    };
    if !res.status().is_success() {
        return res;
    }

    let now = chrono::Utc::now().timestamp();
    let halfway = claims.iat + (claims.exp - claims.iat) / 2;
    if now < halfway {
        return res;
    }

    let fresh = match token::issue_token(
        &state.jwt_secret,
        &claims.sub,
        &claims.username,
        state.token_lifetime_secs,
    ) {
        Ok(t) => t,
        Err(err) => {
            tracing::warn!(error = %err, "token regeneration failed");
            return res;
        }
    };

    let db = state.db.clone();
    let token_for_session = fresh.clone();
    let user_id = claims.sub.clone();
    let stored = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;
        sessions::create_session(&conn, &token_for_session, &user_id).map_err(ApiError::from)
    })
    .await;

    match stored {
        Ok(Ok(_)) => {
            if let Ok(value) = HeaderValue::from_str(&fresh) {
                res.headers_mut().insert("regenerated_token", value);
            }
        }
        Ok(Err(err)) => tracing::warn!(error = %err, "failed to persist regenerated session"),
        Err(err) => tracing::warn!(error = %err, "task join during token regeneration"),
    }

    res
}
