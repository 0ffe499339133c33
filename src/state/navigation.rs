//! Item navigation and per-item lifecycle flags.

use crate::model::{Action, MediaItem};

/// Sequences through a batch of items and applies lifecycle actions.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    items: Vec<MediaItem>,
    index: usize,
}

impl Navigator {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self { items, index: 0 }
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.items.get(self.index)
    }

    /// Overwrite the flags of existing items (same batch, host-side update).
    pub fn sync_flags(&mut self, items: &[MediaItem]) {
        for (mine, theirs) in self.items.iter_mut().zip(items) {
            mine.state = theirs.state.clone();
        }
    }

    /// Move the pointer directly, clamped to the batch.
    pub fn go_to(&mut self, index: usize) -> bool {
        let target = index.min(self.items.len().saturating_sub(1));
        let moved = target != self.index;
        self.index = target;
        moved
    }

    /// Apply an action to the items at `targets`.
    ///
    /// `next`/`prev` only move the pointer (clamped at both ends); the
    /// lifecycle actions ignore `targets` outside the batch. Returns whether
    /// anything changed.
    pub fn apply(&mut self, action: Action, targets: &[usize]) -> bool {
        let changed = match action {
            Action::Next => self.go_to(self.index + 1),
            Action::Prev => self.go_to(self.index.saturating_sub(1)),
            Action::Ignore => self.update(targets, |item| item.state.ignored = true),
            Action::Delete => self.update(targets, |item| {
                item.state.ignored = true;
                item.state.labeled = false;
            }),
            Action::Unignore => self.update(targets, |item| {
                if item.state.ignored {
                    item.state.ignored = false;
                    item.state.labeled = false;
                }
            }),
            Action::None => false,
        };
        if changed {
            log::info!(
                "Applied '{}' (item {}/{}, progress {:?})",
                action.token(),
                self.index + 1,
                self.items.len(),
                self.progress()
            );
        }
        changed
    }

    /// Mark items as labeled after a save.
    pub fn mark_labeled(&mut self, targets: &[usize]) -> bool {
        self.update(targets, |item| item.state.labeled = true)
    }

    /// Flip the selection flag of one item.
    pub fn toggle_selected(&mut self, index: usize) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.state.selected = !item.state.selected;
                true
            }
            None => false,
        }
    }

    /// Items an action applies to.
    ///
    /// In batch mode these are the selected, visible items, falling back to
    /// the current item when nothing is selected.
    pub fn target_indices(&self, batch: bool) -> Vec<usize> {
        if batch {
            let selected: Vec<usize> = self
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.state.selected && item.state.visible)
                .map(|(i, _)| i)
                .collect();
            if !selected.is_empty() {
                return selected;
            }
        }
        if self.items.is_empty() {
            Vec::new()
        } else {
            vec![self.index]
        }
    }

    /// Share of non-ignored items that are labeled; `None` when every item
    /// is ignored or the batch is empty.
    pub fn progress(&self) -> Option<f64> {
        let active = self.items.iter().filter(|i| !i.state.ignored);
        let (total, labeled) = active.fold((0usize, 0usize), |(total, labeled), item| {
            (total + 1, labeled + usize::from(item.state.labeled))
        });
        (total > 0).then(|| labeled as f64 / total as f64)
    }

    fn update<F>(&mut self, targets: &[usize], mut edit: F) -> bool
    where
        F: FnMut(&mut MediaItem),
    {
        let mut changed = false;
        for &index in targets {
            if let Some(item) = self.items.get_mut(index) {
                let before = item.state.clone();
                edit(item);
                changed |= item.state != before;
            } else {
                log::debug!("Ignoring action on missing item {}", index);
            }
        }
        changed
    }
}
