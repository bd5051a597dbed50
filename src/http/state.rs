use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::media::scanner::LibraryScanner;
use crate::media::thumbnail_service::ThumbnailService;
use crate::store::MediaStore;

/// The configured library root, if any, and its display name.
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    pub path: Option<PathBuf>,
    pub name: String,
}

/// How the sweep started after a scan is paced.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingSettings {
    pub enabled: bool,
    pub batch_size: usize,
    pub delay: Duration,
}

/// Shared application state injected into all route handlers via axum::extract::State.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MediaStore>,
    pub scanner: Arc<LibraryScanner>,
    pub thumbnails: Arc<ThumbnailService>,
    pub library: LibrarySettings,
    pub processing: ProcessingSettings,
    /// Cancelled at shutdown; background sweeps watch it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Scan the configured library on the blocking pool and, if it succeeds,
    /// start a background sweep. Does nothing without a configured path.
    pub async fn scan_and_enrich(&self) {
        let Some(path) = self.library.path.clone() else {
            tracing::warn!("no library path configured");
            return;
        };

        let scanner = Arc::clone(&self.scanner);
        let name = self.library.name.clone();
        let result = tokio::task::spawn_blocking(move || scanner.scan_path(&path, &name)).await;

        match result {
            Ok(Ok(Some(_))) => {
                if self.processing.enabled {
                    self.thumbnails.start_background_processing(
                        self.shutdown.clone(),
                        self.processing.batch_size,
                        self.processing.delay,
                    );
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "scan failed"),
            Err(e) => tracing::error!(error = %e, "scan task panicked"),
        }
    }
}
