use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::AppState;
use crate::error::{ApiError, join_err};

/// Authenticated identity for the current request. Resolved once here and
/// threaded explicitly into every operation that checks ownership.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

/// Digest of the session token the current request authenticated with.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Tokens are stored server-side only as SHA-256 digests.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve `Authorization: Bearer <token>` against the session store and
/// stash the user in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?
        .to_string();

    let token_hash = hash_token(&token);

    let lookup_hash = token_hash.clone();
    let user = tokio::task::spawn_blocking(move || state.db.get_session_user(&lookup_hash))
        .await
        .map_err(join_err)??
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".into()))?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
    });
    req.extensions_mut().insert(SessionToken(token_hash));

    Ok(next.run(req).await)
}
