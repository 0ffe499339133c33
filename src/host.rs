//! Messages exchanged with the hosting widget.
//!
//! [`HostState`] is what the host pushes in, with the widget's defaults for
//! every missing field. [`HostUpdate`] is what the engine hands back; nothing
//! leaves the engine except through these values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::model::{Action, Config, HostLabels, ItemState, MediaItem, MediaType};

/// Which toolbar buttons the host enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Buttons {
    pub next: bool,
    pub prev: bool,
    pub save: bool,
    pub config: bool,
    pub delete: bool,
    pub ignore: bool,
    pub unignore: bool,
}

impl Default for Buttons {
    fn default() -> Self {
        Self {
            next: true,
            prev: true,
            save: true,
            config: true,
            delete: true,
            ignore: true,
            unignore: true,
        }
    }
}

impl Buttons {
    /// Whether the button backing `action` is enabled.
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Next => self.next,
            Action::Prev => self.prev,
            Action::Delete => self.delete,
            Action::Ignore => self.ignore,
            Action::Unignore => self.unignore,
            Action::None => true,
        }
    }
}

/// Where relative media URLs are served from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseUrls {
    pub server_root: String,
    pub url: String,
}

/// Color scheme requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Light,
    Dark,
}

/// Full state pushed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostState {
    pub states: Vec<ItemState>,
    pub urls: Vec<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub config: Config,
    pub labels: HostLabels,
    pub action: Action,
    pub metadata: BTreeMap<String, String>,
    /// URLs the host suggests loading ahead of time.
    pub preload: Vec<String>,
    pub show_navigation: bool,
    /// Longest canvas side; the engine settings apply when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_canvas_size: Option<u32>,
    pub buttons: Buttons,
    pub base: BaseUrls,
    /// Progress shown by the host; negative hides it.
    pub progress: f64,
    pub mode: DisplayMode,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            urls: Vec::new(),
            media_type: MediaType::default(),
            config: Config::default(),
            labels: HostLabels::default(),
            action: Action::default(),
            metadata: BTreeMap::new(),
            preload: Vec::new(),
            show_navigation: true,
            max_canvas_size: None,
            buttons: Buttons::default(),
            base: BaseUrls::default(),
            progress: -1.0,
            mode: DisplayMode::default(),
        }
    }
}

impl HostState {
    /// A host state for a batch of image URLs with default flags.
    pub fn images<S: AsRef<str>>(urls: &[S], config: Config) -> Self {
        Self {
            states: urls.iter().map(|_| ItemState::new()).collect(),
            urls: urls.iter().map(|u| u.as_ref().to_string()).collect(),
            config,
            ..Default::default()
        }
    }

    /// Zip `states` and `urls` into media items.
    pub fn items(&self) -> Vec<MediaItem> {
        MediaItem::zip(&self.states, &self.urls)
    }
}

/// Something the engine asks the host to store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostUpdate {
    /// Committed labels, stamped with the save time (epoch ms).
    Labels { labels: HostLabels, updated: u64 },
    /// A new label schema.
    Config { config: Config },
    /// An action token.
    Action { action: Action },
    /// Flags for every item in the batch.
    States { states: Vec<ItemState> },
}

impl HostUpdate {
    pub fn labels(labels: HostLabels) -> Self {
        HostUpdate::Labels {
            labels,
            updated: now_millis(),
        }
    }

    pub fn states(items: &[MediaItem]) -> Self {
        HostUpdate::States {
            states: items.iter().map(|i| i.state.clone()).collect(),
        }
    }
}

/// Wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
