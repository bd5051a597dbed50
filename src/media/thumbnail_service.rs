//! Thumbnail retrieval and the background enrichment sweep.
//!
//! Lookups go memory cache, then the thumbnail directory on disk, then
//! on-demand generation. All generation, on-demand or from the sweep, runs
//! under a per-ID claim in the in-flight set, so a given ID never has two
//! extraction subprocesses at once.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ThumbnailCache;
use crate::media::metadata::MetadataExtractor;
use crate::media::thumbnail::{ThumbnailError, ThumbnailGenerator};
use crate::store::{MediaRecord, MediaStore};

/// Completion signal for one in-flight ID.
#[derive(Debug, Default)]
struct InFlight {
    done: Mutex<bool>,
    finished: Condvar,
}

impl InFlight {
    fn wait(&self) {
        let mut done = self.done.lock().unwrap_or_else(|p| p.into_inner());
        while !*done {
            done = self
                .finished
                .wait(done)
                .unwrap_or_else(|p| p.into_inner());
        }
    }
}

enum Claim<'a> {
    Owner(ClaimGuard<'a>),
    Busy(Arc<InFlight>),
}

/// Held by whoever is generating for an ID. Dropping it releases the ID and
/// wakes any waiters, on success and failure alike.
struct ClaimGuard<'a> {
    service: &'a ThumbnailService,
    id: String,
    signal: Arc<InFlight>,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.service.in_flight().remove(&self.id);
        *self.signal.done.lock().unwrap_or_else(|p| p.into_inner()) = true;
        self.signal.finished.notify_all();
    }
}

pub struct ThumbnailService {
    generator: Arc<dyn ThumbnailGenerator>,
    extractor: Arc<dyn MetadataExtractor>,
    store: Arc<dyn MediaStore>,
    cache: ThumbnailCache,
    processing: Mutex<HashMap<String, Arc<InFlight>>>,
    sweeping: AtomicBool,
    /// Set by every start request; a sweep that finds it set when done runs again.
    rerun: AtomicBool,
}

impl ThumbnailService {
    pub fn new(
        generator: Arc<dyn ThumbnailGenerator>,
        extractor: Arc<dyn MetadataExtractor>,
        store: Arc<dyn MediaStore>,
        cache_capacity: usize,
        cache_max_bytes: u64,
    ) -> Self {
        Self {
            generator,
            extractor,
            store,
            cache: ThumbnailCache::new(cache_capacity, cache_max_bytes),
            processing: Mutex::new(HashMap::new()),
            sweeping: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
        }
    }

    pub fn generator_available(&self) -> bool {
        self.generator.is_available()
    }

    pub fn extractor_available(&self) -> bool {
        self.extractor.is_available()
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, Arc<InFlight>>> {
        self.processing.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Check-and-insert under one lock, so two callers can never both own an ID.
    fn claim(&self, id: &str) -> Claim<'_> {
        let mut processing = self.in_flight();
        if let Some(signal) = processing.get(id) {
            return Claim::Busy(Arc::clone(signal));
        }
        let signal = Arc::new(InFlight::default());
        processing.insert(id.to_string(), Arc::clone(&signal));
        Claim::Owner(ClaimGuard {
            service: self,
            id: id.to_string(),
            signal,
        })
    }

    /// True while `id` is being processed by someone.
    pub fn is_processing(&self, id: &str) -> bool {
        self.in_flight().contains_key(id)
    }

    fn read_from_disk(&self, id: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.generator.path_for(id))
    }

    /// Thumbnail bytes for `id`, generating them if necessary.
    ///
    /// Returns `Ok(None)` when no media record exists for `id`. Blocks on the
    /// generator subprocess when the thumbnail has to be created.
    pub fn get_thumbnail(&self, id: &str) -> Result<Option<Vec<u8>>, ThumbnailError> {
        if let Some(data) = self.cache.get(id) {
            tracing::debug!(id, "thumbnail from cache");
            return Ok(Some(data));
        }

        if let Ok(data) = self.read_from_disk(id) {
            tracing::debug!(id, "thumbnail from disk");
            self.cache.set(id, data.clone());
            return Ok(Some(data));
        }

        let Some(item) = self.store.media_item(id)? else {
            tracing::warn!(id, "media item not found");
            return Ok(None);
        };

        if !self.generator.is_available() {
            tracing::warn!("thumbnail generator not available");
            return Err(ThumbnailError::Unavailable);
        }

        let path = match self.claim(id) {
            Claim::Busy(signal) => {
                tracing::debug!(id, "thumbnail generation already in flight, waiting");
                signal.wait();
                let path = self.generator.path_for(id);
                if !path.is_file() {
                    return Err(ThumbnailError::NotCreated(path));
                }
                path
            }
            Claim::Owner(_guard) => {
                tracing::info!(id, path = %item.path.display(), "generating thumbnail on demand");
                self.generator
                    .generate(&item.path, id, item.duration_secs)
                    .inspect_err(|e| {
                        tracing::error!(id, video = %item.path.display(), error = %e, "failed to generate thumbnail")
                    })?
            }
        };

        let data = std::fs::read(&path)?;
        self.cache.set(id, data.clone());
        tracing::info!(id, size = data.len(), "thumbnail generated and cached");
        Ok(Some(data))
    }

    /// Whether a thumbnail for `id` is already cached or on disk.
    pub fn has_thumbnail(&self, id: &str) -> bool {
        self.cache.get(id).is_some() || self.generator.exists(id)
    }

    /// Forget the thumbnail for `id` in memory and on disk so the next
    /// request regenerates it. Returns whether a file was removed.
    pub fn invalidate(&self, id: &str) -> Result<bool, ThumbnailError> {
        self.cache.delete(id);
        match self.generator.delete(id) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Enrich one record: extract metadata if it has never been extracted,
    /// then generate the thumbnail if none exists.
    ///
    /// A no-op when the same ID is already being processed. `item` is updated
    /// in place with any metadata found. Metadata failures are logged and
    /// skipped; a generation failure is logged and returned.
    pub fn process_media_item(&self, item: &mut MediaRecord) -> Result<(), ThumbnailError> {
        let Claim::Owner(_guard) = self.claim(&item.id) else {
            tracing::debug!(id = %item.id, "already processing, skipping");
            return Ok(());
        };

        if !item.is_enriched() && self.extractor.is_available() {
            match self.extractor.extract(&item.path) {
                Ok(meta) => {
                    match self.store.update_media_metadata(&item.id, &meta) {
                        Ok(()) => tracing::debug!(
                            id = %item.id,
                            duration = ?meta.duration_secs,
                            width = ?meta.width,
                            height = ?meta.height,
                            "metadata extracted"
                        ),
                        Err(e) => {
                            tracing::error!(id = %item.id, error = %e, "failed to update metadata")
                        }
                    }
                    // The seek offset below wants the real duration either way.
                    item.apply_metadata(&meta);
                }
                Err(e) => {
                    tracing::warn!(id = %item.id, path = %item.path.display(), error = %e, "metadata extraction failed")
                }
            }
        }

        if self.generator.is_available() && !self.generator.exists(&item.id) {
            if let Err(e) = self
                .generator
                .generate(&item.path, &item.id, item.duration_secs)
            {
                tracing::debug!(id = %item.id, error = %e, "failed to generate thumbnail");
                return Err(e);
            }
        }

        Ok(())
    }

    /// Spawn the background sweep over every record still missing metadata.
    ///
    /// Items are handled one at a time on the blocking pool with `delay`
    /// between them, so the subprocesses never crowd out request handling.
    /// Cancellation is checked before each page and each item, and interrupts
    /// the delay; a subprocess already running is left to finish.
    ///
    /// Returns `None` when a sweep is already running. The running sweep is
    /// then asked to go over the backlog once more when it finishes, so items
    /// added in the meantime are not left behind. The task resolves to the
    /// number of items processed.
    pub fn start_background_processing(
        self: &Arc<Self>,
        cancel: CancellationToken,
        batch_size: usize,
        delay: Duration,
    ) -> Option<JoinHandle<usize>> {
        self.rerun.store(true, Ordering::SeqCst);
        if self.sweeping.swap(true, Ordering::SeqCst) {
            tracing::debug!("background processing already running, rerun requested");
            return None;
        }

        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut processed = 0;
            loop {
                service.rerun.store(false, Ordering::SeqCst);
                processed += service.sweep(&cancel, batch_size.max(1), delay).await;
                service.sweeping.store(false, Ordering::SeqCst);

                if cancel.is_cancelled()
                    || !service.rerun.load(Ordering::SeqCst)
                    || service.sweeping.swap(true, Ordering::SeqCst)
                {
                    break;
                }
                tracing::debug!("rerun requested during background processing");
            }
            processed
        }))
    }

    /// Page through the backlog by ID. When a page comes back empty the
    /// backlog is read again from the start, so records inserted behind the
    /// cursor are still picked up. Each ID is attempted at most once per
    /// sweep, and the sweep ends after a full pass finds nothing new.
    async fn sweep(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        batch_size: usize,
        delay: Duration,
    ) -> usize {
        tracing::info!("starting background thumbnail/metadata processing");

        let mut processed = 0usize;
        let mut attempted: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut found_in_pass = false;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(processed, "background processing cancelled");
                return processed;
            }

            let page = match self.store.media_without_metadata(cursor.as_deref(), batch_size) {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(error = %e, "failed to get items without metadata");
                    return processed;
                }
            };
            let Some(last) = page.last() else {
                if !found_in_pass {
                    break;
                }
                found_in_pass = false;
                cursor = None;
                continue;
            };
            cursor = Some(last.id.clone());

            for mut item in page {
                if !attempted.insert(item.id.clone()) {
                    continue;
                }
                found_in_pass = true;

                if cancel.is_cancelled() {
                    tracing::info!(processed, "background processing cancelled");
                    return processed;
                }

                let id = item.id.clone();
                let service = Arc::clone(self);
                let result =
                    tokio::task::spawn_blocking(move || service.process_media_item(&mut item)).await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(id = %id, error = %e, "failed to process item"),
                    Err(e) => tracing::error!(id = %id, error = %e, "processing task panicked"),
                }
                processed += 1;

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(processed, "background processing cancelled");
                        return processed;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::info!(processed, "background processing completed");
        processed
    }

    /// `(entries, bytes)` currently held by the memory cache.
    pub fn cache_stats(&self) -> (usize, u64) {
        (self.cache.len(), self.cache.size())
    }

    /// Entry and byte limits of the memory cache.
    pub fn cache_limits(&self) -> (usize, u64) {
        (self.cache.capacity(), self.cache.max_bytes())
    }
}
