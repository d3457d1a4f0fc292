use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use spotter_types::api::{ListImagesResponse, UploadResponse};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::pipeline;

/// POST /upload — multipart field `image`; drives the detect-persist
/// pipeline and reports the label summary.
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("image") {
            let original_filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("failed to read upload: {e}")))?;
            upload = Some((original_filename, bytes));
            break;
        }
    }

    let (original_filename, bytes) =
        upload.ok_or_else(|| ApiError::Validation("no file selected".into()))?;

    let outcome = pipeline::process_upload(&state, &user, &original_filename, bytes).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            image: outcome.image,
            summary: outcome.summary,
        }),
    ))
}

/// GET /images — the requesting user's uploads, newest first.
pub async fn list_images(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let images = pipeline::list_user_images(&state, &user).await?;
    Ok(Json(ListImagesResponse { images }))
}

/// POST /delete/{image_id} — owner-only removal of one upload.
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(image_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    pipeline::delete_image(&state, &user, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
