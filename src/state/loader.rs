//! Media loading: resolve a URL to its natural dimensions.
//!
//! The [`MediaLoader`] is the state machine (`loading`, `loaded`, `error`)
//! for the current target URL. Resolution itself happens elsewhere, either
//! synchronously through a [`MediaSource`] or on the [`ResolverThread`]; every
//! completion carries the [`LoadTicket`] it was issued for, so results for a
//! superseded URL are dropped.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::error::{LabelerError, Result};
use crate::model::Dimensions;

/// Loader state for the current URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Loading,
    Loaded,
    Error,
}

/// How the media and the side panel are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
}

impl Layout {
    /// Tall media is laid out vertically.
    pub fn for_size(size: Dimensions) -> Self {
        if size.height > size.width {
            Layout::Vertical
        } else {
            Layout::Horizontal
        }
    }
}

/// Natural size and layout of a loaded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaState {
    pub size: Dimensions,
    pub layout: Layout,
}

/// Identifies one load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub url: String,
}

/// Resolves media URLs to natural dimensions.
pub trait MediaSource {
    fn resolve(&self, url: &str) -> Result<Dimensions>;
}

/// Load state machine for the current target URL.
#[derive(Debug, Default)]
pub struct MediaLoader {
    generation: u64,
    url: Option<String>,
    state: LoadState,
    media: Option<MediaState>,
    error: Option<String>,
}

impl MediaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading `url`, superseding any request in flight.
    pub fn request(&mut self, url: &str) -> LoadTicket {
        self.generation += 1;
        self.url = Some(url.to_string());
        self.state = LoadState::Loading;
        self.media = None;
        self.error = None;
        log::debug!("Loading {} (generation {})", url, self.generation);
        LoadTicket {
            generation: self.generation,
            url: url.to_string(),
        }
    }

    /// Apply a completion. Returns `false` if the ticket is stale.
    pub fn complete(&mut self, ticket: &LoadTicket, result: Result<Dimensions>) -> bool {
        if ticket.generation != self.generation || self.state != LoadState::Loading {
            log::debug!(
                "Ignoring stale load of {} (generation {}, current {})",
                ticket.url,
                ticket.generation,
                self.generation
            );
            return false;
        }
        match result {
            Ok(size) => {
                let layout = Layout::for_size(size);
                log::info!(
                    "Loaded {} ({}x{}, {:?})",
                    ticket.url,
                    size.width,
                    size.height,
                    layout
                );
                self.state = LoadState::Loaded;
                self.media = Some(MediaState { size, layout });
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", ticket.url, e);
                self.state = LoadState::Error;
                self.error = Some(e.to_string());
            }
        }
        true
    }

    /// Resolve the current request synchronously.
    pub fn load_with(&mut self, url: &str, source: &dyn MediaSource) -> LoadState {
        let ticket = self.request(url);
        self.complete(&ticket, source.resolve(url));
        self.state
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn media(&self) -> Option<&MediaState> {
        self.media.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Natural dimensions of the loaded media.
    pub fn dimensions(&self) -> Result<Dimensions> {
        self.media
            .map(|m| m.size)
            .ok_or_else(|| LabelerError::missing_ref("media dimensions"))
    }
}

// ============================================================================
// Filesystem source
// ============================================================================

/// Resolves URLs to files below a root directory.
///
/// Only the image header is decoded.
#[derive(Debug, Clone, Default)]
pub struct FileMediaSource {
    root: PathBuf,
}

impl FileMediaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a URL to a local path.
    pub fn path_for(&self, url: &str) -> Result<PathBuf> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(LabelerError::media_load(
                url,
                "remote URLs are not supported by the file source",
            ));
        }
        let local = url.strip_prefix("file://").unwrap_or(url);
        let path = Path::new(local);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let relative = local.strip_prefix("files/").unwrap_or(local);
        Ok(self.root.join(relative))
    }
}

impl MediaSource for FileMediaSource {
    fn resolve(&self, url: &str) -> Result<Dimensions> {
        let path = self.path_for(url)?;
        let (width, height) = image::image_dimensions(&path)
            .map_err(|e| LabelerError::media_load(url, e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(LabelerError::media_load(url, "media has no pixels"));
        }
        Ok(Dimensions::new(width, height))
    }
}

// ============================================================================
// Background resolution
// ============================================================================

/// Outcome of a background resolution.
#[derive(Debug)]
pub struct Resolved {
    pub ticket: LoadTicket,
    pub result: Result<Dimensions>,
}

enum ThreadMessage {
    Resolve(LoadTicket),
    Shutdown,
}

/// Resolves media on a background thread.
///
/// Requests are processed in order; results are collected with
/// [`ResolverThread::poll`] (non-blocking) or [`ResolverThread::wait`].
pub struct ResolverThread {
    request_tx: Sender<ThreadMessage>,
    result_rx: Receiver<Resolved>,
    thread_handle: Option<JoinHandle<()>>,
    pending: usize,
}

impl ResolverThread {
    /// Spawn the thread with the given source.
    pub fn spawn<S>(source: S) -> Result<Self>
    where
        S: MediaSource + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (result_tx, result_rx) = mpsc::channel::<Resolved>();

        let thread_handle = thread::Builder::new()
            .name("media-resolver".to_string())
            .spawn(move || {
                log::debug!("Media resolver thread started");
                Self::thread_loop(&source, request_rx, result_tx);
                log::debug!("Media resolver thread exiting");
            })?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            pending: 0,
        })
    }

    fn thread_loop(
        source: &dyn MediaSource,
        request_rx: Receiver<ThreadMessage>,
        result_tx: Sender<Resolved>,
    ) {
        while let Ok(message) = request_rx.recv() {
            match message {
                ThreadMessage::Resolve(ticket) => {
                    let result = source.resolve(&ticket.url);
                    if result_tx.send(Resolved { ticket, result }).is_err() {
                        log::warn!("Result channel closed, resolver thread exiting");
                        break;
                    }
                }
                ThreadMessage::Shutdown => break,
            }
        }
    }

    /// Queue a ticket for resolution.
    pub fn request(&mut self, ticket: LoadTicket) {
        if self.request_tx.send(ThreadMessage::Resolve(ticket)).is_err() {
            log::error!("Failed to send resolve request: channel closed");
        } else {
            self.pending += 1;
        }
    }

    /// Take one finished result without blocking.
    pub fn poll(&mut self) -> Option<Resolved> {
        match self.result_rx.try_recv() {
            Ok(resolved) => {
                self.pending = self.pending.saturating_sub(1);
                Some(resolved)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Resolver thread disconnected");
                None
            }
        }
    }

    /// Block until the next result arrives. `None` if nothing is pending.
    pub fn wait(&mut self) -> Option<Resolved> {
        if self.pending == 0 {
            return None;
        }
        match self.result_rx.recv() {
            Ok(resolved) => {
                self.pending -= 1;
                Some(resolved)
            }
            Err(_) => {
                log::warn!("Resolver thread disconnected");
                self.pending = 0;
                None
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }
}

impl Drop for ResolverThread {
    fn drop(&mut self) {
        let _ = self.request_tx.send(ThreadMessage::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Resolver thread panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Dimensions);

    impl MediaSource for FixedSource {
        fn resolve(&self, url: &str) -> Result<Dimensions> {
            if url.ends_with(".missing") {
                Err(LabelerError::media_load(url, "not found"))
            } else {
                Ok(self.0)
            }
        }
    }

    fn temp_image(name: &str, width: u32, height: u32) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("labeler-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join(name);
        image::RgbImage::new(width, height)
            .save(&path)
            .expect("write test image");
        path
    }

    #[test]
    fn test_load_success_sets_layout() {
        let mut loader = MediaLoader::new();
        let ticket = loader.request("a.png");
        assert_eq!(loader.state(), LoadState::Loading);
        assert!(loader.dimensions().is_err());

        assert!(loader.complete(&ticket, Ok(Dimensions::new(100, 200))));
        assert_eq!(loader.state(), LoadState::Loaded);
        assert_eq!(loader.media().map(|m| m.layout), Some(Layout::Vertical));
        assert_eq!(loader.dimensions().expect("loaded"), Dimensions::new(100, 200));
    }

    #[test]
    fn test_square_media_is_horizontal() {
        assert_eq!(Layout::for_size(Dimensions::new(50, 50)), Layout::Horizontal);
        assert_eq!(Layout::for_size(Dimensions::new(80, 50)), Layout::Horizontal);
    }

    #[test]
    fn test_stale_completion_ignored() {
        let mut loader = MediaLoader::new();
        let first = loader.request("a.png");
        let second = loader.request("b.png");
        assert!(!loader.complete(&first, Ok(Dimensions::new(10, 10))));
        assert_eq!(loader.state(), LoadState::Loading);
        assert!(loader.complete(&second, Ok(Dimensions::new(20, 10))));
        assert_eq!(loader.url(), Some("b.png"));
        assert_eq!(loader.dimensions().expect("loaded").width, 20);
    }

    #[test]
    fn test_completion_applied_once() {
        let mut loader = MediaLoader::new();
        let ticket = loader.request("a.png");
        assert!(loader.complete(&ticket, Ok(Dimensions::new(10, 10))));
        assert!(!loader.complete(&ticket, Ok(Dimensions::new(99, 99))));
        assert_eq!(loader.dimensions().expect("loaded").width, 10);
    }

    #[test]
    fn test_error_is_terminal() {
        let mut loader = MediaLoader::new();
        let state = loader.load_with("x.missing", &FixedSource(Dimensions::new(1, 1)));
        assert_eq!(state, LoadState::Error);
        assert!(loader.error().is_some());
        assert!(matches!(
            loader.dimensions(),
            Err(LabelerError::MissingRef { .. })
        ));

        // Re-requesting the URL starts over.
        let ticket = loader.request("x.png");
        assert_eq!(loader.state(), LoadState::Loading);
        assert!(loader.complete(&ticket, Ok(Dimensions::new(3, 4))));
    }

    #[test]
    fn test_file_source_reads_header() {
        let path = temp_image("header.png", 12, 7);
        let source = FileMediaSource::new(path.parent().expect("parent"));
        let dims = source.resolve("files/header.png").expect("resolve");
        assert_eq!(dims, Dimensions::new(12, 7));
        let url = format!("file://{}", path.display());
        assert_eq!(source.resolve(&url).expect("resolve"), dims);
    }

    #[test]
    fn test_file_source_errors() {
        let source = FileMediaSource::new(std::env::temp_dir());
        assert!(matches!(
            source.resolve("https://example.com/a.png"),
            Err(LabelerError::MediaLoad { .. })
        ));
        assert!(matches!(
            source.resolve("does-not-exist-labeler.png"),
            Err(LabelerError::MediaLoad { .. })
        ));
    }

    #[test]
    fn test_resolver_thread_round_trip() {
        let mut loader = MediaLoader::new();
        let mut resolver = ResolverThread::spawn(FixedSource(Dimensions::new(640, 480)))
            .expect("spawn resolver");

        let stale = loader.request("old.png");
        resolver.request(stale);
        let current = loader.request("new.png");
        resolver.request(current);
        assert_eq!(resolver.pending_count(), 2);

        let mut applied = 0;
        while let Some(done) = resolver.wait() {
            if loader.complete(&done.ticket, done.result) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(loader.url(), Some("new.png"));
        assert_eq!(loader.state(), LoadState::Loaded);
        assert!(resolver.poll().is_none());
    }
}
