use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE images (
                id                  INTEGER PRIMARY KEY,
                original_filename   TEXT NOT NULL,
                stored_filename     TEXT NOT NULL UNIQUE,
                detected_filename   TEXT NOT NULL UNIQUE,
                detection_results   TEXT NOT NULL DEFAULT '',
                uploaded_at         TEXT NOT NULL DEFAULT (datetime('now')),
                user_id             INTEGER NOT NULL REFERENCES users(id)
            );

            CREATE INDEX idx_images_owner
                ON images(user_id, uploaded_at);

            CREATE TABLE sessions (
                token_hash  TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
