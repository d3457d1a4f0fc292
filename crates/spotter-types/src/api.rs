use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

// -- Images --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub detected_filename: String,
    pub detection_results: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image: ImageResponse,
    /// Human-readable label summary; "No objects detected" when the
    /// detector returned nothing.
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageResponse>,
}
