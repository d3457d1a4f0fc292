//! The upload-detect-persist pipeline, plus owner-scoped listing and
//! deletion. Everything here is independent of HTTP types so the whole
//! contract is testable without a server.

use std::sync::Arc;

use axum::body::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use spotter_db::models::ImageRow;
use spotter_types::api::ImageResponse;

use crate::AppState;
use crate::error::{ApiError, join_err};
use crate::middleware::CurrentUser;
use crate::storage::{allocate_names, has_allowed_extension};

pub const NO_OBJECTS_SUMMARY: &str = "No objects detected";

#[derive(Debug)]
pub struct UploadOutcome {
    pub image: ImageResponse,
    pub summary: String,
}

/// Display string for a label list: detector order, comma-joined, no dedup.
pub fn summarize_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        NO_OBJECTS_SUMMARY.to_string()
    } else {
        labels.join(", ")
    }
}

/// Run one upload end to end: validate, write the raw bytes, detect, write
/// the annotated copy, commit the row. An Image row exists afterwards if
/// and only if both files are on disk.
pub async fn process_upload(
    state: &AppState,
    user: &CurrentUser,
    original_filename: &str,
    bytes: Bytes,
) -> Result<UploadOutcome, ApiError> {
    if original_filename.is_empty() {
        return Err(ApiError::Validation("no file selected".into()));
    }
    if !has_allowed_extension(original_filename) {
        return Err(ApiError::Validation(
            "file type not allowed; upload an image (png, jpg, jpeg, gif, bmp)".into(),
        ));
    }

    let (stored, detected) = allocate_names(original_filename);

    state
        .store
        .save(&stored, &bytes)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("writing upload to disk: {e}")))?;

    // Detection and the annotated write run off the async runtime. If either
    // fails, the upload leaves no trace on disk and no row is created.
    let detect_result = {
        let detector = state.detector.clone();
        let stored_path = state.store.path(&stored);
        let detected_path = state.store.path(&detected);
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, ApiError> {
            let detection = detector
                .detect(&stored_path)
                .map_err(|e| ApiError::Detection(e.to_string()))?;
            detection
                .annotated
                .save(&detected_path)
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("writing annotated image: {e}")))?;
            Ok(detection.labels)
        })
        .await
        .map_err(join_err)?
    };

    let labels = match detect_result {
        Ok(labels) => labels,
        Err(e) => {
            cleanup(state, &stored, &detected).await;
            return Err(e);
        }
    };

    let detection_results = labels.join(", ");
    let summary = summarize_labels(&labels);

    let insert_result = {
        let db_state = Arc::clone(state);
        let user_id = user.id;
        let original = original_filename.to_string();
        let stored_name = stored.clone();
        let detected_name = detected.clone();
        let results = detection_results.clone();
        tokio::task::spawn_blocking(move || -> Result<ImageRow, ApiError> {
            let id = db_state.db.insert_image(
                &original,
                &stored_name,
                &detected_name,
                &results,
                user_id,
            )?;
            db_state
                .db
                .get_image(id)?
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("image row {id} vanished after insert")))
        })
        .await
        .map_err(join_err)?
    };

    let row = match insert_result {
        Ok(row) => row,
        Err(e) => {
            cleanup(state, &stored, &detected).await;
            return Err(e);
        }
    };

    Ok(UploadOutcome {
        image: image_response(row),
        summary,
    })
}

/// Best-effort removal of a failed upload's files. A failed cleanup is
/// logged and never escalates past the original error.
async fn cleanup(state: &AppState, stored: &str, detected: &str) {
    if let Err(e) = state.store.remove(stored).await {
        warn!("cleanup of {} failed: {}", stored, e);
    }
    if let Err(e) = state.store.remove(detected).await {
        warn!("cleanup of {} failed: {}", detected, e);
    }
}

/// All of a user's uploads, newest first.
pub async fn list_user_images(
    state: &AppState,
    user: &CurrentUser,
) -> Result<Vec<ImageResponse>, ApiError> {
    let db_state = Arc::clone(state);
    let user_id = user.id;
    let rows = tokio::task::spawn_blocking(move || db_state.db.list_images_for_user(user_id))
        .await
        .map_err(join_err)??;

    Ok(rows.into_iter().map(image_response).collect())
}

/// Delete one upload: owner-only. Files are removed best-effort; the row
/// removal always happens so listings never see a half-deleted image.
pub async fn delete_image(
    state: &AppState,
    user: &CurrentUser,
    image_id: i64,
) -> Result<(), ApiError> {
    let db_state = Arc::clone(state);
    let row = tokio::task::spawn_blocking(move || db_state.db.get_image(image_id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| ApiError::NotFound(format!("no image with id {image_id}")))?;

    if row.user_id != user.id {
        return Err(ApiError::Forbidden(
            "you can only delete your own images".into(),
        ));
    }

    if let Err(e) = state.store.remove(&row.stored_filename).await {
        warn!("deleting {} failed: {}", row.stored_filename, e);
    }
    if let Err(e) = state.store.remove(&row.detected_filename).await {
        warn!("deleting {} failed: {}", row.detected_filename, e);
    }

    let db_state = Arc::clone(state);
    tokio::task::spawn_blocking(move || db_state.db.delete_image(image_id))
        .await
        .map_err(join_err)??;

    Ok(())
}

pub(crate) fn image_response(row: ImageRow) -> ImageResponse {
    let uploaded_at = parse_sqlite_utc(&row.uploaded_at);
    ImageResponse {
        id: row.id,
        original_filename: row.original_filename,
        stored_filename: row.stored_filename,
        detected_filename: row.detected_filename,
        detection_results: row.detection_results,
        uploaded_at,
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert.
fn parse_sqlite_utc(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt uploaded_at '{}': {}", raw, e);
            DateTime::default()
        })
}
