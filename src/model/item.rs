//! Media items and the actions that move them through their lifecycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-item flags as the host stores them (the `states` array).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemState {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub labeled: bool,
}

fn default_visible() -> bool {
    true
}

impl ItemState {
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }
}

/// An image or video in the current batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(flatten)]
    pub state: ItemState,
}

impl MediaItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: ItemState::new(),
        }
    }

    /// Zip the host's parallel `states` and `urls` arrays.
    ///
    /// A length mismatch truncates to the shorter of the two.
    pub fn zip(states: &[ItemState], urls: &[String]) -> Vec<MediaItem> {
        if states.len() != urls.len() {
            log::warn!(
                "Host sent {} states but {} urls, using the first {}",
                states.len(),
                urls.len(),
                states.len().min(urls.len())
            );
        }
        states
            .iter()
            .zip(urls)
            .map(|(state, url)| MediaItem {
                url: url.clone(),
                state: state.clone(),
            })
            .collect()
    }
}

/// Kind of media being labeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

/// Action token exchanged with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Next,
    Prev,
    Delete,
    Ignore,
    Unignore,
    #[default]
    #[serde(rename = "")]
    None,
}

impl Action {
    /// Wire token for this action.
    pub fn token(&self) -> &'static str {
        match self {
            Action::Next => "next",
            Action::Prev => "prev",
            Action::Delete => "delete",
            Action::Ignore => "ignore",
            Action::Unignore => "unignore",
            Action::None => "",
        }
    }

    /// Whether the action only moves between items.
    pub fn is_navigation(&self) -> bool {
        matches!(self, Action::Next | Action::Prev)
    }
}
