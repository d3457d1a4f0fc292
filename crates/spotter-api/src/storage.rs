use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// On-disk home of every upload. Each successful upload leaves two flat
/// files here: the raw bytes under the stored name and the annotated copy
/// under the detected name.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn save(&self, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        fs::write(self.path(name), bytes).await
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

pub fn has_allowed_extension(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Strip path components and unsafe characters from a client-supplied name.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Allocate the on-disk names for one upload: a fresh 8-hex-char token
/// prefixed to the sanitized original name, plus the derived name for the
/// annotated copy. The annotated name is always recoverable from the stored
/// name alone.
pub fn allocate_names(original: &str) -> (String, String) {
    let token = Uuid::new_v4().simple().to_string();
    let stored = format!("{}_{}", &token[..8], sanitize_filename(original));
    let detected = format!("detected_{stored}");
    (stored, detected)
}
