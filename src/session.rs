//! Labeling session: single/batch composition and the host emit boundary.
//!
//! A [`Session`] owns everything for the batch the host pushed last: the item
//! navigator, the media loader, the draft and cursor for the open item, and
//! (for videos) the timestamped label track. Inputs go in through
//! [`Session::sync_host`] and [`Session::handle_input`]; the only things that
//! come out are [`HostUpdate`] values and calls on the [`Notifier`].

use std::collections::HashMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{LabelerError, Result};
use crate::host::{HostState, HostUpdate};
use crate::model::{
    Action, Config, ConfigScope, Dimensions, HostLabels, LabelDocument, MediaType, Point,
    RegionGeometry, RegionKind, TimestampedLabel,
};
use crate::raster::{self, OverlayCache};
use crate::settings::LabelerSettings;
use crate::state::{
    Cursor, DraftManager, KeyCommand, Layout, LoadState, LoadTicket, MediaLoader, Navigator,
    PointerEvent,
};
use crate::viewport::{self, Viewport};

/// How the current batch is presented.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Presentation {
    #[default]
    Empty,
    SingleImage,
    SingleVideo,
    BatchImage,
    Unsupported(String),
}

impl Presentation {
    /// Pick the presentation for `count` items of `media_type`.
    pub fn select(count: usize, media_type: MediaType) -> Self {
        match (count, media_type) {
            (0, _) => Presentation::Empty,
            (1, MediaType::Image) => Presentation::SingleImage,
            (1, MediaType::Video) => Presentation::SingleVideo,
            (_, MediaType::Image) => Presentation::BatchImage,
            (_, MediaType::Video) => {
                Presentation::Unsupported("Videos cannot be batch labeled.".to_string())
            }
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Presentation::SingleImage | Presentation::SingleVideo)
    }
}

/// User-facing side effects the engine may request.
pub trait Notifier {
    /// Show a short message to the user.
    fn notify(&mut self, message: &str);

    /// Move keyboard focus to the labeling surface.
    fn request_focus(&mut self) {}
}

/// Notifier that logs messages and keeps them for inspection.
#[derive(Debug, Default)]
pub struct LogNotifier {
    messages: Vec<String>,
    focus_requests: usize,
}

impl LogNotifier {
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn focus_requests(&self) -> usize {
        self.focus_requests
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str) {
        log::info!("Notification: {}", message);
        self.messages.push(message.to_string());
    }

    fn request_focus(&mut self) {
        self.focus_requests += 1;
    }
}

/// Commands issued from buttons or keyboard shortcuts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Save,
    SaveConfig(Config),
    Next,
    Prev,
    Delete,
    Ignore,
    Unignore,
    /// Discard the draft.
    Reset,
    /// Flip selection of a batch item.
    ToggleSelected(usize),
    /// Move the video playhead (seconds).
    Seek(f64),
    /// Toggle a value of a category, for the image or the selected region.
    ToggleLabel {
        scope: ConfigScope,
        name: String,
        value: String,
    },
    SelectRegion(Option<usize>),
}

/// Everything the session reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputEvent {
    Pointer(PointerEvent),
    Key(KeyCommand),
    Command(Command),
}

/// A region mapped to screen coordinates for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRegion {
    pub kind: RegionKind,
    /// Index in the draft, `None` while still being drawn.
    pub index: Option<usize>,
    pub points: Vec<Point>,
    pub selected: bool,
}

/// Timestamped labels of the open video and the playhead.
#[derive(Debug, Clone, Default)]
struct VideoTrack {
    labels: Vec<TimestampedLabel>,
    position: f64,
}

impl VideoTrack {
    fn replace(&mut self, mut labels: Vec<TimestampedLabel>) {
        labels.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.labels = labels;
    }

    /// Labels covering `time`: an exact timestamp or a span containing it.
    fn document_at(&self, time: f64) -> LabelDocument {
        self.labels
            .iter()
            .find(|l| match l.end {
                Some(end) => l.timestamp <= time && time <= end,
                None => l.timestamp == time,
            })
            .map(|l| l.labels.clone())
            .unwrap_or_default()
    }

    /// Insert or replace the entry at `time`, keeping timestamp order.
    fn upsert(&mut self, time: f64, labels: LabelDocument) {
        match self.labels.iter_mut().find(|l| l.timestamp == time) {
            Some(existing) => existing.labels = labels,
            None => {
                let at = self.labels.partition_point(|l| l.timestamp < time);
                self.labels.insert(at, TimestampedLabel::new(time, labels));
            }
        }
    }
}

/// One labeling session.
pub struct Session<N: Notifier> {
    notifier: N,
    settings: LabelerSettings,
    host: HostState,
    synced: bool,
    presentation: Presentation,
    navigator: Navigator,
    loader: MediaLoader,
    load_requests: Vec<LoadTicket>,
    viewport: Option<Viewport>,
    draft: DraftManager,
    cursor: Cursor,
    overlays: OverlayCache,
    /// Committed labels of items navigated away from, by URL.
    committed_cache: HashMap<String, LabelDocument>,
    track: VideoTrack,
    last_host_action: Action,
}

impl<N: Notifier> Session<N> {
    pub fn new(settings: LabelerSettings, notifier: N) -> Self {
        let cursor = Cursor::new(settings.cursor_options());
        Self {
            notifier,
            settings,
            host: HostState::default(),
            synced: false,
            presentation: Presentation::Empty,
            navigator: Navigator::default(),
            loader: MediaLoader::new(),
            load_requests: Vec::new(),
            viewport: None,
            draft: DraftManager::default(),
            cursor,
            overlays: OverlayCache::new(),
            committed_cache: HashMap::new(),
            track: VideoTrack::default(),
            last_host_action: Action::None,
        }
    }

    // ------------------------------------------------------------------------
    // Host → engine
    // ------------------------------------------------------------------------

    /// Take a fresh copy of the host state.
    ///
    /// A changed URL list replaces the batch; otherwise only the item flags
    /// are synced. Changed labels replace the committed document (and the
    /// draft). An inbound action is recorded but not applied again.
    pub fn sync_host(&mut self, state: HostState) -> Result<()> {
        let items = state.items();
        let urls_changed = !self.synced
            || self
                .navigator
                .items()
                .iter()
                .map(|i| &i.url)
                .ne(items.iter().map(|i| &i.url));
        let labels_changed = urls_changed || state.labels != self.host.labels;

        if state.action != Action::None {
            log::debug!("Host reported action '{}'", state.action.token());
        }
        self.last_host_action = state.action;

        if urls_changed {
            log::info!("Opening batch of {} {:?} items", items.len(), state.media_type);
            self.navigator = Navigator::new(items);
            self.committed_cache.clear();
            self.track = VideoTrack::default();
        } else {
            self.navigator.sync_flags(&items);
        }
        self.presentation = Presentation::select(self.navigator.len(), state.media_type);
        self.host = state;
        self.synced = true;

        if !self.host.config.has_regions() {
            self.cursor.set_region_type(None);
        }

        if let Presentation::Unsupported(reason) = &self.presentation {
            let reason = reason.clone();
            log::warn!("{}", reason);
            self.notifier.notify(&reason);
            return Err(LabelerError::UnsupportedPresentation(reason));
        }

        if labels_changed {
            self.apply_host_labels();
        }
        self.ensure_current_requested();
        Ok(())
    }

    fn apply_host_labels(&mut self) {
        let committed = match (&self.presentation, &self.host.labels) {
            (Presentation::SingleVideo, HostLabels::Video(labels)) => {
                self.track.replace(labels.clone());
                self.track.document_at(self.track.position)
            }
            (Presentation::SingleVideo, HostLabels::Image(_)) => {
                self.track.replace(Vec::new());
                LabelDocument::new()
            }
            (_, HostLabels::Image(doc)) => doc.clone(),
            (_, HostLabels::Video(_)) => {
                log::warn!("Ignoring video labels for {:?}", self.presentation);
                LabelDocument::new()
            }
        };
        self.open_document(committed);
    }

    fn open_document(&mut self, committed: LabelDocument) {
        self.draft.replace_committed(committed);
        self.cursor.reset_for_item();
        self.overlays.clear();
    }

    /// Queue a load for the current item if its URL is not the loader's target.
    fn ensure_current_requested(&mut self) {
        if !self.presentation.is_single() {
            return;
        }
        let Some(url) = self.navigator.current().map(|i| i.url.clone()) else {
            return;
        };
        if self.loader.url() == Some(url.as_str()) {
            return;
        }
        let ticket = self.loader.request(&url);
        self.viewport = None;
        self.cursor.abandon();
        self.load_requests.push(ticket);
    }

    /// Load requests issued since the last call.
    pub fn take_load_requests(&mut self) -> Vec<LoadTicket> {
        std::mem::take(&mut self.load_requests)
    }

    /// Feed a load completion back in. Returns `false` for stale tickets.
    pub fn on_media_loaded(&mut self, ticket: &LoadTicket, result: Result<Dimensions>) -> bool {
        if !self.loader.complete(ticket, result) {
            return false;
        }
        if let Some(media) = self.loader.media() {
            self.viewport = Some(Viewport::fit(
                media.size,
                self.max_canvas_size(),
                Point::default(),
            ));
            self.notifier.request_focus();
        }
        true
    }

    /// Override where the renderer draws the media.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Dispatch one input event and collect what the host should store.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<Vec<HostUpdate>> {
        match event {
            InputEvent::Pointer(event) => {
                self.handle_pointer(event)?;
                Ok(Vec::new())
            }
            InputEvent::Key(key) => {
                self.handle_key(key);
                Ok(Vec::new())
            }
            InputEvent::Command(command) => self.handle_command(command),
        }
    }

    /// Whether region drawing is possible right now.
    pub fn pointer_enabled(&self) -> bool {
        self.presentation.is_single()
            && self.loader.state() == LoadState::Loaded
            && self.host.config.has_regions()
            && self.viewport.is_some()
    }

    fn handle_pointer(&mut self, event: PointerEvent) -> Result<bool> {
        if !self.pointer_enabled() {
            return Ok(false);
        }
        let Some(viewport) = self.viewport else {
            return Ok(false);
        };
        let canvas = viewport::canvas_dimensions(self.loader.dimensions()?, self.max_canvas_size());
        let changed = self
            .cursor
            .handle_pointer(event, &viewport, canvas, &mut self.draft);
        self.overlays.truncate(self.draft.labels().masks.len());
        Ok(changed)
    }

    fn handle_key(&mut self, key: KeyCommand) -> bool {
        match key {
            KeyCommand::SelectTool(Some(kind)) if !self.host.config.has_regions() => {
                log::debug!("No region categories configured, ignoring {} tool", kind.name());
                return false;
            }
            _ => {}
        }
        let changed = self.cursor.handle_key(key, &mut self.draft);
        self.overlays.truncate(self.draft.labels().masks.len());
        changed
    }

    fn handle_command(&mut self, command: Command) -> Result<Vec<HostUpdate>> {
        match command {
            Command::Save => self.save(),
            Command::SaveConfig(config) => Ok(self.save_config(config)),
            Command::Next => Ok(self.apply_action(Action::Next)),
            Command::Prev => Ok(self.apply_action(Action::Prev)),
            Command::Delete => Ok(self.apply_action(Action::Delete)),
            Command::Ignore => Ok(self.apply_action(Action::Ignore)),
            Command::Unignore => Ok(self.apply_action(Action::Unignore)),
            Command::Reset => {
                self.draft.reset_draft();
                self.cursor.reset_for_item();
                self.overlays.clear();
                Ok(Vec::new())
            }
            Command::ToggleSelected(index) => Ok(self.toggle_selected(index)),
            Command::Seek(time) => {
                self.seek(time);
                Ok(Vec::new())
            }
            Command::ToggleLabel { scope, name, value } => {
                self.toggle_label(scope, &name, &value);
                Ok(Vec::new())
            }
            Command::SelectRegion(index) => {
                self.cursor.select_region(index);
                Ok(Vec::new())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn save(&mut self) -> Result<Vec<HostUpdate>> {
        if !self.host.buttons.save {
            self.notifier.notify("Saving is disabled.");
            return Ok(Vec::new());
        }
        let missing = self.host.config.missing_required(self.draft.labels());
        if !missing.is_empty() {
            self.notifier
                .notify(&format!("Missing required labels: {}", missing.join(", ")));
            return Ok(Vec::new());
        }
        self.cursor.abandon();

        let mut updates = Vec::new();
        match self.presentation {
            Presentation::SingleImage => {
                let doc = self.draft.commit(Some(self.loader.dimensions()?));
                self.navigator.mark_labeled(&[self.navigator.index()]);
                self.draft.mark_committed(doc.clone());
                updates.push(HostUpdate::labels(HostLabels::Image(doc)));
            }
            Presentation::SingleVideo => {
                let doc = self.draft.commit(Some(self.loader.dimensions()?));
                self.track.upsert(self.track.position, doc.clone());
                self.navigator.mark_labeled(&[self.navigator.index()]);
                self.draft.mark_committed(doc);
                updates.push(HostUpdate::labels(HostLabels::Video(self.track.labels.clone())));
            }
            Presentation::BatchImage => {
                let doc = self.draft.commit(None);
                let targets = self.navigator.target_indices(true);
                log::info!("Saving labels to {} batch items", targets.len());
                self.navigator.mark_labeled(&targets);
                self.draft.mark_committed(doc.clone());
                updates.push(HostUpdate::labels(HostLabels::Image(doc)));
                updates.push(HostUpdate::states(self.navigator.items()));
            }
            Presentation::Empty | Presentation::Unsupported(_) => {
                return Err(LabelerError::missing_ref("open item"));
            }
        }
        self.cursor.region_index = None;
        self.overlays.clear();
        self.notifier.request_focus();
        Ok(updates)
    }

    fn save_config(&mut self, config: Config) -> Vec<HostUpdate> {
        if !self.host.buttons.config {
            self.notifier.notify("Editing the configuration is disabled.");
            return Vec::new();
        }
        log::info!(
            "Saving config ({} image, {} region categories)",
            config.image.len(),
            config.regions.len()
        );
        self.host.config = config.clone();
        if !config.has_regions() {
            self.cursor.set_region_type(None);
        }
        vec![HostUpdate::Config { config }]
    }

    fn apply_action(&mut self, action: Action) -> Vec<HostUpdate> {
        if !self.host.buttons.allows(action) {
            self.notifier
                .notify(&format!("The '{}' action is disabled.", action.token()));
            return Vec::new();
        }
        if self.navigator.is_empty() {
            log::debug!("No items, ignoring '{}'", action.token());
            return Vec::new();
        }

        let mut updates = vec![HostUpdate::Action { action }];
        if action.is_navigation() {
            let leaving = self.navigator.current().map(|i| i.url.clone());
            if self.navigator.apply(action, &[]) {
                if let Some(url) = leaving {
                    if self.draft.is_dirty() {
                        log::debug!("Discarding unsaved draft for {}", url);
                    }
                    self.committed_cache.insert(url, self.draft.committed().clone());
                }
                let committed = self
                    .navigator
                    .current()
                    .and_then(|i| self.committed_cache.get(&i.url))
                    .cloned()
                    .unwrap_or_default();
                self.open_document(committed);
                self.ensure_current_requested();
            }
            return updates;
        }

        let batch = self.presentation == Presentation::BatchImage;
        let targets = self.navigator.target_indices(batch);
        if self.navigator.apply(action, &targets) && batch {
            updates.push(HostUpdate::states(self.navigator.items()));
        }
        updates
    }

    fn toggle_selected(&mut self, index: usize) -> Vec<HostUpdate> {
        if self.presentation != Presentation::BatchImage {
            log::debug!("Selection only applies to batches");
            return Vec::new();
        }
        if self.navigator.toggle_selected(index) {
            vec![HostUpdate::states(self.navigator.items())]
        } else {
            Vec::new()
        }
    }

    fn seek(&mut self, time: f64) {
        if self.presentation != Presentation::SingleVideo {
            log::debug!("Seek ignored outside video labeling");
            return;
        }
        if !time.is_finite() || time < 0.0 {
            log::debug!("Ignoring seek to {}", time);
            return;
        }
        self.track.position = time;
        let committed = self.track.document_at(time);
        self.open_document(committed);
    }

    fn toggle_label(&mut self, scope: ConfigScope, name: &str, value: &str) -> bool {
        let Some(category) = self.host.config.find(scope, name) else {
            log::debug!("Unknown {:?} category '{}'", scope, name);
            return false;
        };
        if !category.accepts(value) {
            log::debug!("Category '{}' does not accept '{}'", name, value);
            return false;
        }
        let category = category.clone();
        match scope {
            ConfigScope::Image => {
                self.draft.mutate(|doc| {
                    category.toggle(&mut doc.image, value);
                });
                true
            }
            ConfigScope::Regions => {
                let (Some(kind), Some(index)) = (self.cursor.region_type, self.cursor.region_index)
                else {
                    log::debug!("No region selected for '{}'", name);
                    return false;
                };
                if index >= self.draft.labels().region_count(kind) {
                    return false;
                }
                self.draft.mutate(|doc| {
                    if let Some(labels) = doc.region_labels_mut(kind, index) {
                        category.toggle(labels, value);
                    }
                });
                true
            }
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn host(&self) -> &HostState {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.host.config
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn loader(&self) -> &MediaLoader {
        &self.loader
    }

    pub fn layout(&self) -> Option<Layout> {
        self.loader.media().map(|m| m.layout)
    }

    pub fn draft(&self) -> &DraftManager {
        &self.draft
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Playhead of the open video, in seconds.
    pub fn video_position(&self) -> f64 {
        self.track.position
    }

    pub fn video_labels(&self) -> &[TimestampedLabel] {
        &self.track.labels
    }

    /// Action the host reported with its last state push.
    pub fn last_host_action(&self) -> Action {
        self.last_host_action
    }

    /// Labeled share of non-ignored items.
    pub fn progress(&self) -> Option<f64> {
        self.navigator.progress()
    }

    /// Longest canvas side in use.
    pub fn max_canvas_size(&self) -> u32 {
        self.host
            .max_canvas_size
            .unwrap_or(self.settings.max_canvas_size)
    }

    /// Boxes and polygons (including the one being drawn) in screen space.
    pub fn screen_regions(&self) -> Vec<ScreenRegion> {
        let Some(viewport) = self.viewport else {
            return Vec::new();
        };
        let labels = self.draft.labels();
        let selected = |kind: RegionKind, index: usize| {
            self.cursor.region_type == Some(kind) && self.cursor.region_index == Some(index)
        };
        let project = |points: &[Point]| -> Vec<Point> {
            points.iter().map(|p| viewport.to_screen(*p)).collect()
        };

        let mut regions: Vec<ScreenRegion> = labels
            .boxes
            .iter()
            .enumerate()
            .map(|(i, b)| ScreenRegion {
                kind: RegionKind::Box,
                index: Some(i),
                points: project(&b.geometry.corners()[..]),
                selected: selected(RegionKind::Box, i),
            })
            .chain(labels.polygons.iter().enumerate().map(|(i, p)| ScreenRegion {
                kind: RegionKind::Polygon,
                index: Some(i),
                points: project(&p.geometry.points),
                selected: selected(RegionKind::Polygon, i),
            }))
            .collect();

        match self.cursor.pending() {
            Some(RegionGeometry::Box(b)) => regions.push(ScreenRegion {
                kind: RegionKind::Box,
                index: None,
                points: project(&b.corners()[..]),
                selected: true,
            }),
            Some(RegionGeometry::Polygon(p)) => regions.push(ScreenRegion {
                kind: RegionKind::Polygon,
                index: None,
                points: project(&p.points),
                selected: true,
            }),
            _ => {}
        }
        regions
    }

    /// Number of mask overlays to draw, including a mask being painted.
    pub fn mask_overlay_count(&self) -> usize {
        let masks = self.draft.labels().masks.len();
        match (self.cursor.pending(), self.cursor.region_index) {
            (Some(RegionGeometry::Mask(_)), None) => masks + 1,
            _ => masks,
        }
    }

    /// Overlay for mask `index` at mask resolution.
    pub fn mask_overlay(&mut self, index: usize) -> Option<&RgbaImage> {
        let masks = &self.draft.labels().masks;
        let source = match self.cursor.pending() {
            Some(RegionGeometry::Mask(m))
                if self.cursor.region_index.unwrap_or(masks.len()) == index =>
            {
                m
            }
            _ => &masks.get(index)?.geometry,
        };
        Some(self.overlays.overlay(index, source))
    }

    /// Overlay for mask `index` scaled to the viewport.
    pub fn scaled_mask_overlay(&mut self, index: usize) -> Option<RgbaImage> {
        let viewport = self.viewport?;
        let display = Dimensions::new(
            viewport.width.round().max(1.0) as u32,
            viewport.height.round().max(1.0) as u32,
        );
        let overlay = self.mask_overlay(index)?;
        Some(raster::scale_overlay(overlay, display))
    }
}
