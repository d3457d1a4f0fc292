use crate::Database;
use crate::models::{ImageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
                (username, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Sessions --

    pub fn create_session(&self, token_hash: &str, user_id: i64, ttl_days: u32) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at)
                 VALUES (?1, ?2, datetime('now', '+' || ?3 || ' days'))",
                rusqlite::params![token_hash, user_id, ttl_days],
            )?;
            Ok(())
        })
    }

    /// Resolve a session token digest to its user, ignoring expired sessions.
    pub fn get_session_user(&self, token_hash: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.password_hash, u.created_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1
                   AND s.expires_at > datetime('now')",
            )?;
            stmt.query_row([token_hash], user_from_row).optional()
        })
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(n > 0)
        })
    }

    // -- Images --

    pub fn insert_image(
        &self,
        original_filename: &str,
        stored_filename: &str,
        detected_filename: &str,
        detection_results: &str,
        user_id: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO images
                   (original_filename, stored_filename, detected_filename, detection_results, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    original_filename,
                    stored_filename,
                    detected_filename,
                    detection_results,
                    user_id
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_image(&self, id: i64) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{IMAGE_COLUMNS} WHERE id = ?1"))?;
            stmt.query_row([id], image_from_row).optional()
        })
    }

    /// All images owned by a user, newest first. `datetime('now')` has second
    /// granularity, so the rowid tiebreak keeps same-second uploads ordered.
    pub fn list_images_for_user(&self, user_id: i64) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{IMAGE_COLUMNS} WHERE user_id = ?1 ORDER BY uploaded_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], image_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_image(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

const IMAGE_COLUMNS: &str = "SELECT id, original_filename, stored_filename, detected_filename, \
                             detection_results, uploaded_at, user_id FROM images";

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, username, password_hash, created_at FROM users WHERE username = ?1")?;
    stmt.query_row([username], user_from_row).optional()
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password_hash, created_at FROM users WHERE id = ?1")?;
    stmt.query_row([id], user_from_row).optional()
}

fn user_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn image_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ImageRow, rusqlite::Error> {
    Ok(ImageRow {
        id: row.get(0)?,
        original_filename: row.get(1)?,
        stored_filename: row.get(2)?,
        detected_filename: row.get(3)?,
        detection_results: row.get(4)?,
        uploaded_at: row.get(5)?,
        user_id: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use tempfile::TempDir;

    fn open_test_db() -> (Database, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::open(&dir.path().join("test.db")).expect("open db");
        (db, dir)
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (db, _dir) = open_test_db();
        let id = db.create_user("alice", "hash-one").unwrap();

        assert!(db.create_user("alice", "hash-two").is_err());

        // The original row is untouched.
        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.password_hash, "hash-one");
    }

    #[test]
    fn user_lookup_by_username() {
        let (db, _dir) = open_test_db();
        db.create_user("bob", "h").unwrap();

        assert!(db.get_user_by_username("bob").unwrap().is_some());
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn session_roundtrip_and_logout() {
        let (db, _dir) = open_test_db();
        let user_id = db.create_user("carol", "h").unwrap();

        db.create_session("digest-1", user_id, 30).unwrap();
        let resolved = db.get_session_user("digest-1").unwrap().unwrap();
        assert_eq!(resolved.id, user_id);

        assert!(db.delete_session("digest-1").unwrap());
        assert!(db.get_session_user("digest-1").unwrap().is_none());
        assert!(!db.delete_session("digest-1").unwrap());
    }

    #[test]
    fn expired_session_is_not_resolved() {
        let (db, _dir) = open_test_db();
        let user_id = db.create_user("dave", "h").unwrap();
        db.create_session("digest-2", user_id, 30).unwrap();

        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hours')
                 WHERE token_hash = 'digest-2'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.get_session_user("digest-2").unwrap().is_none());
    }

    #[test]
    fn images_list_newest_first() {
        let (db, _dir) = open_test_db();
        let user_id = db.create_user("erin", "h").unwrap();

        let a = db.insert_image("a.png", "s_a.png", "d_a.png", "", user_id).unwrap();
        let b = db.insert_image("b.png", "s_b.png", "d_b.png", "", user_id).unwrap();
        let c = db.insert_image("c.png", "s_c.png", "d_c.png", "", user_id).unwrap();

        let listed: Vec<i64> = db
            .list_images_for_user(user_id)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, vec![c, b, a]);
    }

    #[test]
    fn listing_is_scoped_to_owner() {
        let (db, _dir) = open_test_db();
        let alice = db.create_user("alice", "h").unwrap();
        let bob = db.create_user("bob", "h").unwrap();
        db.insert_image("a.png", "s1.png", "d1.png", "dog", alice).unwrap();

        assert_eq!(db.list_images_for_user(alice).unwrap().len(), 1);
        assert!(db.list_images_for_user(bob).unwrap().is_empty());
    }

    #[test]
    fn image_delete_removes_row() {
        let (db, _dir) = open_test_db();
        let user_id = db.create_user("frank", "h").unwrap();
        let id = db.insert_image("a.png", "s.png", "d.png", "cat", user_id).unwrap();

        db.delete_image(id).unwrap();
        assert!(db.get_image(id).unwrap().is_none());
        assert!(db.list_images_for_user(user_id).unwrap().is_empty());
    }
}
