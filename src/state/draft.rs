//! Draft label state for the open item.
//!
//! The committed document and the working draft are kept strictly apart: all
//! edits go through [`DraftManager::mutate`] and only [`DraftManager::commit`]
//! produces something the host may persist.

use crate::model::{Dimensions, LabelDocument, Region, RegionLabel};

/// Working copy of an item's labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftState {
    pub labels: LabelDocument,
    pub dirty: bool,
}

/// Owns the committed document of the open item and its draft.
#[derive(Debug, Clone, Default)]
pub struct DraftManager {
    committed: LabelDocument,
    draft: DraftState,
}

impl DraftManager {
    /// Open an item: the draft starts as a deep copy of the committed labels.
    pub fn open_item(committed: LabelDocument) -> Self {
        let draft = DraftState {
            labels: committed.clone(),
            dirty: false,
        };
        Self { committed, draft }
    }

    /// Current working labels.
    pub fn labels(&self) -> &LabelDocument {
        &self.draft.labels
    }

    /// Last committed labels.
    pub fn committed(&self) -> &LabelDocument {
        &self.committed
    }

    pub fn draft(&self) -> &DraftState {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.dirty
    }

    /// Apply an edit to the working labels and mark the draft dirty.
    pub fn mutate<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut LabelDocument),
    {
        edit(&mut self.draft.labels);
        self.draft.dirty = true;
    }

    /// Throw the draft away and start again from the committed labels.
    pub fn reset_draft(&mut self) {
        if self.draft.dirty {
            log::debug!("Discarding dirty draft");
        }
        self.draft = DraftState {
            labels: self.committed.clone(),
            dirty: false,
        };
    }

    /// Replace the committed labels from outside (navigation or host reset).
    ///
    /// The draft is replaced, never merged.
    pub fn replace_committed(&mut self, committed: LabelDocument) {
        self.committed = committed;
        self.reset_draft();
    }

    /// Validate the draft and produce a committed snapshot.
    ///
    /// Boxes are put in corner order, polygons lose duplicate vertices and
    /// masks are resampled to `natural`. Image categories are kept as they
    /// are, empty ones included. Regions that still fail their
    /// invariants are dropped. The manager itself is unchanged; call
    /// [`DraftManager::mark_committed`] once the snapshot is persisted.
    pub fn commit(&self, natural: Option<Dimensions>) -> LabelDocument {
        let labels = &self.draft.labels;
        let mut doc = LabelDocument {
            image: labels.image.clone(),
            boxes: normalize_regions(&labels.boxes, natural),
            polygons: normalize_regions(&labels.polygons, natural),
            masks: Vec::new(),
            dimensions: natural.or(labels.dimensions),
        };

        // Without the natural size a mask that is not already at that size
        // cannot be committed.
        doc.masks = normalize_regions(&labels.masks, natural)
            .into_iter()
            .filter(|m| match natural {
                Some(n) => m.geometry.dimensions == n,
                None => labels.dimensions.is_none_or(|d| d == m.geometry.dimensions),
            })
            .collect();

        log::debug!(
            "Committed draft: {} image labels, {} boxes, {} polygons, {} masks",
            doc.image.len(),
            doc.boxes.len(),
            doc.polygons.len(),
            doc.masks.len()
        );
        doc
    }

    /// Record a persisted snapshot as the new committed state.
    pub fn mark_committed(&mut self, doc: LabelDocument) {
        log::info!("Draft committed");
        self.committed = doc;
        self.reset_draft();
    }
}

fn normalize_regions<G>(regions: &[RegionLabel<G>], natural: Option<Dimensions>) -> Vec<RegionLabel<G>>
where
    G: Region,
{
    regions
        .iter()
        .filter_map(|region| {
            let geometry = region.geometry.to_normalized(natural);
            match geometry.validate() {
                Ok(()) => Some(RegionLabel {
                    labels: region.labels.clone(),
                    geometry,
                }),
                Err(e) => {
                    log::debug!("Dropping region on commit: {}", e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxGeometry, LabelMap, Mask, Point, PolygonGeometry, RegionGeometry};

    fn sample_document() -> LabelDocument {
        let mut doc = LabelDocument::new();
        doc.image.insert("cat/dog".into(), vec!["cat".into()]);
        doc.push_region(
            LabelMap::new(),
            RegionGeometry::Box(BoxGeometry::new(Point::new(0.1, 0.1), Point::new(0.4, 0.6))),
        );
        doc.dimensions = Some(Dimensions::new(100, 200));
        doc
    }

    #[test]
    fn test_open_item_is_clean_copy() {
        let manager = DraftManager::open_item(sample_document());
        assert!(!manager.is_dirty());
        assert_eq!(manager.labels(), manager.committed());
    }

    #[test]
    fn test_mutate_does_not_touch_committed() {
        let mut manager = DraftManager::open_item(sample_document());
        manager.mutate(|doc| doc.boxes.clear());
        assert!(manager.is_dirty());
        assert!(manager.labels().boxes.is_empty());
        assert_eq!(manager.committed().boxes.len(), 1);
    }

    #[test]
    fn test_reset_restores_committed() {
        let mut manager = DraftManager::open_item(sample_document());
        manager.mutate(|doc| {
            doc.image.clear();
        });
        manager.reset_draft();
        assert!(!manager.is_dirty());
        assert_eq!(manager.labels(), &sample_document());
    }

    #[test]
    fn test_commit_strips_incomplete_regions() {
        let mut manager = DraftManager::open_item(LabelDocument::new());
        manager.mutate(|doc| {
            doc.push_region(
                LabelMap::new(),
                RegionGeometry::Polygon(PolygonGeometry::new(vec![
                    Point::new(0.1, 0.1),
                    Point::new(0.2, 0.2),
                ])),
            );
            let p = Point::new(0.5, 0.5);
            doc.push_region(LabelMap::new(), RegionGeometry::Box(BoxGeometry::new(p, p)));
            doc.push_region(
                LabelMap::new(),
                RegionGeometry::Box(BoxGeometry::new(Point::new(0.9, 0.9), Point::new(0.2, 0.3))),
            );
        });

        let doc = manager.commit(Some(Dimensions::new(10, 10)));
        assert!(doc.polygons.is_empty());
        assert_eq!(doc.boxes.len(), 1);
        assert_eq!(doc.boxes[0].geometry.pt1, Point::new(0.2, 0.3));
        assert_eq!(doc.boxes[0].geometry.pt2, Point::new(0.9, 0.9));
    }

    #[test]
    fn test_commit_resamples_masks_to_natural() {
        let mut manager = DraftManager::open_item(LabelDocument::new());
        manager.mutate(|doc| {
            let mut m = Mask::empty(Dimensions::new(5, 10));
            m.values[0] = 255;
            doc.push_region(LabelMap::new(), RegionGeometry::Mask(m));
        });
        let doc = manager.commit(Some(Dimensions::new(10, 20)));
        assert_eq!(doc.masks[0].geometry.dimensions, Dimensions::new(10, 20));
        assert_eq!(doc.masks[0].geometry.painted(), 4);
        assert_eq!(doc.dimensions, Some(Dimensions::new(10, 20)));
    }

    #[test]
    fn test_commit_without_dimensions_drops_unscaled_masks() {
        let mut manager = DraftManager::open_item(LabelDocument::new());
        manager.mutate(|doc| {
            doc.push_region(
                LabelMap::new(),
                RegionGeometry::Mask(Mask::empty(Dimensions::new(5, 10))),
            );
            doc.dimensions = Some(Dimensions::new(10, 20));
        });
        assert!(manager.commit(None).masks.is_empty());
    }

    #[test]
    fn test_reset_then_commit_is_identity() {
        let mut manager = DraftManager::open_item(LabelDocument::new());
        manager.mutate(|doc| *doc = sample_document());
        let natural = Dimensions::new(100, 200);
        let first = manager.commit(Some(natural));
        manager.mark_committed(first.clone());

        manager.mutate(|doc| doc.boxes.clear());
        manager.reset_draft();
        let second = manager.commit(Some(natural));
        assert_eq!(
            first.to_json().expect("serialize"),
            second.to_json().expect("serialize")
        );
    }

    #[test]
    fn test_reset_then_commit_keeps_pushed_empty_category() {
        let mut pushed = sample_document();
        pushed.image.insert("quality".into(), Vec::new());
        let mut manager = DraftManager::open_item(pushed.clone());
        manager.mutate(|doc| doc.image.clear());
        manager.reset_draft();

        let doc = manager.commit(Some(Dimensions::new(100, 200)));
        assert_eq!(doc.image.get("quality"), Some(&Vec::new()));
        assert_eq!(
            doc.to_json().expect("serialize"),
            pushed.to_json().expect("serialize")
        );
    }
}
