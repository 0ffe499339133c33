//! Label documents exchanged with the host.
//!
//! A [`LabelDocument`] holds the classification labels of one image plus its
//! regions, split by geometry kind. Videos carry an ordered list of
//! [`TimestampedLabel`]s instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::geometry::{BoxGeometry, Dimensions, Mask, PolygonGeometry, RegionGeometry, RegionKind};

/// Category name to ordered selected values.
pub type LabelMap = BTreeMap<String, Vec<String>>;

/// A region together with its own classification labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionLabel<G> {
    #[serde(default)]
    pub labels: LabelMap,
    #[serde(flatten)]
    pub geometry: G,
}

impl<G> RegionLabel<G> {
    pub fn new(geometry: G) -> Self {
        Self {
            labels: LabelMap::new(),
            geometry,
        }
    }

    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }
}

/// Labels for a single image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelDocument {
    #[serde(default)]
    pub image: LabelMap,
    #[serde(default)]
    pub boxes: Vec<RegionLabel<BoxGeometry>>,
    #[serde(default)]
    pub polygons: Vec<RegionLabel<PolygonGeometry>>,
    #[serde(default)]
    pub masks: Vec<RegionLabel<Mask>>,
    /// Natural media size, filled in on commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl LabelDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of regions of one kind.
    pub fn region_count(&self, kind: RegionKind) -> usize {
        match kind {
            RegionKind::Box => self.boxes.len(),
            RegionKind::Polygon => self.polygons.len(),
            RegionKind::Mask => self.masks.len(),
        }
    }

    /// Whether the document carries no labels and no regions.
    pub fn is_empty(&self) -> bool {
        self.image.values().all(Vec::is_empty)
            && self.boxes.is_empty()
            && self.polygons.is_empty()
            && self.masks.is_empty()
    }

    /// Append a region and return its index within its kind.
    pub fn push_region(&mut self, labels: LabelMap, geometry: RegionGeometry) -> (RegionKind, usize) {
        let kind = geometry.kind();
        match geometry {
            RegionGeometry::Box(g) => self.boxes.push(RegionLabel::new(g).with_labels(labels)),
            RegionGeometry::Polygon(g) => {
                self.polygons.push(RegionLabel::new(g).with_labels(labels))
            }
            RegionGeometry::Mask(g) => self.masks.push(RegionLabel::new(g).with_labels(labels)),
        }
        (kind, self.region_count(kind) - 1)
    }

    /// Remove a region; out-of-range indices are ignored.
    pub fn remove_region(&mut self, kind: RegionKind, index: usize) -> bool {
        if index >= self.region_count(kind) {
            return false;
        }
        match kind {
            RegionKind::Box => {
                self.boxes.remove(index);
            }
            RegionKind::Polygon => {
                self.polygons.remove(index);
            }
            RegionKind::Mask => {
                self.masks.remove(index);
            }
        }
        true
    }

    /// Mutable access to a region's classification labels.
    pub fn region_labels_mut(&mut self, kind: RegionKind, index: usize) -> Option<&mut LabelMap> {
        match kind {
            RegionKind::Box => self.boxes.get_mut(index).map(|r| &mut r.labels),
            RegionKind::Polygon => self.polygons.get_mut(index).map(|r| &mut r.labels),
            RegionKind::Mask => self.masks.get_mut(index).map(|r| &mut r.labels),
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Labels attached to a point (or span) in a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedLabel {
    /// Seconds from the start of the video.
    pub timestamp: f64,
    /// Optional end of the labeled span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default)]
    pub labels: LabelDocument,
}

impl TimestampedLabel {
    pub fn new(timestamp: f64, labels: LabelDocument) -> Self {
        Self {
            timestamp,
            end: None,
            labels,
        }
    }
}

/// Committed labels as the host stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostLabels {
    /// Video labels, ordered by timestamp
    Video(Vec<TimestampedLabel>),
    /// Image labels
    Image(LabelDocument),
}

impl Default for HostLabels {
    fn default() -> Self {
        HostLabels::Image(LabelDocument::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    #[test]
    fn test_document_wire_shape() {
        let mut doc = LabelDocument::new();
        doc.image.insert("cat/dog".into(), vec!["dog".into()]);
        doc.push_region(
            LabelMap::new(),
            RegionGeometry::Box(BoxGeometry::new(Point::new(0.1, 0.2), Point::new(0.3, 0.4))),
        );
        let value = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(value["image"]["cat/dog"][0], "dog");
        assert_eq!(value["boxes"][0]["pt1"]["x"], 0.1);
        assert_eq!(value["boxes"][0]["labels"], serde_json::json!({}));
        assert!(value.get("dimensions").is_none());
    }

    #[test]
    fn test_document_defaults_missing_fields() {
        let doc: LabelDocument = serde_json::from_str(r#"{"image": {}}"#).expect("parse");
        assert!(doc.is_empty());
        assert!(doc.masks.is_empty());
    }

    #[test]
    fn test_mask_region_flattened() {
        let json = r#"{"masks": [{"labels": {"kind": ["a"]},
            "dimensions": {"width": 2, "height": 1}, "values": [0, 255]}]}"#;
        let doc: LabelDocument = serde_json::from_str(json).expect("parse");
        assert_eq!(doc.masks[0].geometry.dimensions, Dimensions::new(2, 1));
        assert_eq!(doc.masks[0].labels["kind"], vec!["a".to_string()]);
    }

    #[test]
    fn test_push_and_remove_region() {
        let mut doc = LabelDocument::new();
        let poly = PolygonGeometry::new(vec![Point::new(0.0, 0.0); 3]);
        assert_eq!(
            doc.push_region(LabelMap::new(), RegionGeometry::Polygon(poly.clone())),
            (RegionKind::Polygon, 0)
        );
        assert_eq!(
            doc.push_region(LabelMap::new(), RegionGeometry::Polygon(poly)),
            (RegionKind::Polygon, 1)
        );
        assert!(doc.remove_region(RegionKind::Polygon, 0));
        assert!(!doc.remove_region(RegionKind::Polygon, 5));
        assert_eq!(doc.region_count(RegionKind::Polygon), 1);
    }

    #[test]
    fn test_host_labels_untagged() {
        let image: HostLabels = serde_json::from_str(r#"{"image": {"a": ["b"]}}"#).expect("image");
        assert!(matches!(image, HostLabels::Image(_)));

        let video: HostLabels =
            serde_json::from_str(r#"[{"timestamp": 1.5, "labels": {"image": {}}}]"#)
                .expect("video");
        match video {
            HostLabels::Video(track) => assert_eq!(track[0].timestamp, 1.5),
            other => panic!("expected video labels, got {:?}", other),
        }
    }
}
