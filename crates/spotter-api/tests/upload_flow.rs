//! End-to-end exercise of the signup → login → upload → delete flow at the
//! pipeline level, with a deterministic detector standing in for the real
//! model.

use std::sync::Arc;

use axum::body::Bytes;
use tempfile::TempDir;

use spotter_api::auth::{
    SESSION_TTL_DAYS, generate_token, hash_password, validate_signup, verify_password,
};
use spotter_api::middleware::{CurrentUser, hash_token};
use spotter_api::pipeline::{list_user_images, delete_image, process_upload};
use spotter_api::storage::UploadStore;
use spotter_api::{AppState, AppStateInner};
use spotter_db::Database;
use spotter_detect::FakeDetector;

async fn fresh_state(labels: &[&str]) -> (AppState, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::open(&dir.path().join("spotter.db")).expect("open db");
    let store = UploadStore::new(dir.path().join("uploads"))
        .await
        .expect("upload store");
    let state = Arc::new(AppStateInner {
        db,
        store,
        detector: Arc::new(FakeDetector::with_labels(labels)),
    });
    (state, dir)
}

#[tokio::test]
async fn signup_login_upload_delete_scenario() -> anyhow::Result<()> {
    let (state, _dir) = fresh_state(&["dog", "person"]).await;

    // Signup: validation passes, the stored hash is not the plaintext.
    validate_signup("alice", "pass1", "pass1").expect("signup input is valid");
    let password_hash = hash_password("pass1").expect("hash");
    assert_ne!(password_hash, "pass1");
    let user_id = state.db.create_user("alice", &password_hash)?;

    // Login: credential check plus a session the middleware can resolve.
    let stored = state
        .db
        .get_user_by_username("alice")?
        .expect("alice exists");
    assert!(verify_password("pass1", &stored.password_hash));
    assert!(!verify_password("wrong", &stored.password_hash));

    let token = generate_token();
    state
        .db
        .create_session(&hash_token(&token), user_id, SESSION_TTL_DAYS)?;
    let session_user = state
        .db
        .get_session_user(&hash_token(&token))?
        .expect("session resolves");
    assert_eq!(session_user.id, user_id);

    let alice = CurrentUser {
        id: session_user.id,
        username: session_user.username,
    };

    // Upload: the detector's labels land in the row, joined in order.
    let outcome = process_upload(&state, &alice, "valid.png", Bytes::from_static(b"png")).await?;
    assert_eq!(outcome.image.detection_results, "dog, person");
    assert!(state.store.path(&outcome.image.stored_filename).exists());
    assert!(state.store.path(&outcome.image.detected_filename).exists());

    // Delete as the owner: row and both files are gone.
    delete_image(&state, &alice, outcome.image.id)
        .await
        .expect("owner delete");
    assert!(!state.store.path(&outcome.image.stored_filename).exists());
    assert!(!state.store.path(&outcome.image.detected_filename).exists());
    assert!(list_user_images(&state, &alice).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn duplicate_signup_leaves_original_untouched() -> anyhow::Result<()> {
    let (state, _dir) = fresh_state(&[]).await;

    let hash = hash_password("pass1")?;
    let user_id = state.db.create_user("alice", &hash)?;

    // Handler path: a taken username is detected before any insert.
    assert!(state.db.get_user_by_username("alice")?.is_some());
    // And the unique constraint backstops a racing insert.
    assert!(state.db.create_user("alice", "other-hash").is_err());

    let original = state.db.get_user_by_id(user_id)?.expect("still there");
    assert_eq!(original.password_hash, hash);

    Ok(())
}

#[tokio::test]
async fn logout_invalidates_the_session() -> anyhow::Result<()> {
    let (state, _dir) = fresh_state(&[]).await;

    let user_id = state.db.create_user("alice", &hash_password("pass1")?)?;
    let token = generate_token();
    let digest = hash_token(&token);
    state.db.create_session(&digest, user_id, SESSION_TTL_DAYS)?;

    assert!(state.db.get_session_user(&digest)?.is_some());
    assert!(state.db.delete_session(&digest)?);
    assert!(state.db.get_session_user(&digest)?.is_none());

    Ok(())
}
