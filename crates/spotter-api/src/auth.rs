use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use rand::RngCore;
use tracing::info;

use spotter_types::api::{LoginRequest, LoginResponse, SignupRequest, SignupResponse};

use crate::AppState;
use crate::error::{ApiError, join_err};
use crate::middleware::{CurrentUser, SessionToken, hash_token};

pub const SESSION_TTL_DAYS: u32 = 30;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    validate_signup(&username, &req.password, &req.confirm_password)?;

    let password = req.password;
    let name = username.clone();
    let user_id = tokio::task::spawn_blocking(move || -> Result<i64, ApiError> {
        if state.db.get_user_by_username(&name)?.is_some() {
            return Err(ApiError::UsernameTaken);
        }
        // Hash inside the blocking pool — argon2 is deliberately slow.
        let password_hash = hash_password(&password)?;
        Ok(state.db.create_user(&name, &password_hash)?)
    })
    .await
    .map_err(join_err)??;

    info!("User {} signed up", username);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { user_id, username }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let password = req.password;

    let token = generate_token();
    let token_hash = hash_token(&token);

    let user = tokio::task::spawn_blocking(
        move || -> Result<spotter_db::models::UserRow, ApiError> {
            let user = state
                .db
                .get_user_by_username(&username)?
                .ok_or_else(|| ApiError::Unauthorized("invalid username or password".into()))?;

            if !verify_password(&password, &user.password_hash) {
                return Err(ApiError::Unauthorized("invalid username or password".into()));
            }

            state.db.create_session(&token_hash, user.id, SESSION_TTL_DAYS)?;
            Ok(user)
        },
    )
    .await
    .map_err(join_err)??;

    info!("User {} logged in", user.username);

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(SessionToken(token_hash)): Extension<SessionToken>,
) -> Result<impl IntoResponse, ApiError> {
    tokio::task::spawn_blocking(move || state.db.delete_session(&token_hash))
        .await
        .map_err(join_err)??;

    info!("User {} logged out", user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub fn validate_signup(username: &str, password: &str, confirm: &str) -> Result<(), ApiError> {
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".into(),
        ));
    }
    if username.len() < 3 {
        return Err(ApiError::Validation(
            "username must be at least 3 characters".into(),
        ));
    }
    if password.len() < 4 {
        return Err(ApiError::Validation(
            "password must be at least 4 characters".into(),
        ));
    }
    if password != confirm {
        return Err(ApiError::Validation("passwords do not match".into()));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_validation_rules() {
        assert!(validate_signup("alice", "pass1", "pass1").is_ok());
        assert!(validate_signup("", "pass1", "pass1").is_err());
        assert!(validate_signup("al", "pass1", "pass1").is_err());
        assert!(validate_signup("alice", "abc", "abc").is_err());
        assert!(validate_signup("alice", "pass1", "pass2").is_err());
    }

    #[test]
    fn password_hash_never_equals_plaintext() {
        let hash = hash_password("pass1").unwrap();
        assert_ne!(hash, "pass1");
        assert!(verify_password("pass1", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn tokens_are_unique_and_digested() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(hash_token(&a), a);
    }
}
