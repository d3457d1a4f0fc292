/// Database row types — these map directly to SQLite rows.
/// Distinct from spotter-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct ImageRow {
    pub id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub detected_filename: String,
    pub detection_results: String,
    pub uploaded_at: String,
    pub user_id: i64,
}
