pub mod auth;
pub mod error;
pub mod images;
pub mod middleware;
pub mod pipeline;
pub mod storage;

use std::sync::Arc;

use spotter_db::Database;
use spotter_detect::Detector;
use storage::UploadStore;

/// Shared application state. The detector is built once at startup and
/// reused for every request.
pub struct AppStateInner {
    pub db: Database,
    pub store: UploadStore,
    pub detector: Arc<dyn Detector>,
}

pub type AppState = Arc<AppStateInner>;
