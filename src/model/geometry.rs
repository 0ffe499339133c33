//! Region geometry: boxes, polygons and pixel masks.
//!
//! Boxes and polygons live in normalized media space (`[0, 1]` on both axes,
//! relative to the natural media size). Masks are dense bitmaps with their own
//! pixel dimensions, which only have to match the natural media size once
//! committed.

use serde::{Deserialize, Serialize};

use crate::constants::{mask, pointer};
use crate::error::{LabelerError, Result};
use crate::raster;
use crate::viewport::Viewport;

/// A 2D point. Normalized media space unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Clamp both coordinates into the unit square.
    pub fn clamped(&self) -> Self {
        Self::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }

    fn same_as(&self, other: &Point) -> bool {
        self.distance_to(other) < pointer::POINT_EPSILON
    }
}

/// Integer pixel dimensions of a media item or bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Region kinds supported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Box,
    Polygon,
    Mask,
}

impl RegionKind {
    /// Lowercase name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Box => "box",
            RegionKind::Polygon => "polygon",
            RegionKind::Mask => "mask",
        }
    }
}

/// Shared interface of the three geometry variants.
pub trait Region {
    /// Find the vertex (or, for masks, the painted pixel) under a screen position.
    ///
    /// Returns the index of the grabbed vertex. The tolerance is in screen pixels.
    fn hit_test(&self, screen: Point, viewport: &Viewport, tolerance: f64) -> Option<usize>;

    /// Canonical committed form: ordered box corners, deduplicated polygon
    /// vertices, masks binarized and resampled to `natural`.
    fn to_normalized(&self, natural: Option<Dimensions>) -> Self;

    /// Check the commit invariants.
    fn validate(&self) -> Result<()>;

    fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}

// ============================================================================
// Box
// ============================================================================

/// An axis-aligned box given by two corners.
///
/// While drafting `pt1` is the drag origin and `pt2` the current pointer, so
/// they may be in any order. Committed boxes satisfy `pt1 <= pt2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub pt1: Point,
    pub pt2: Point,
}

impl BoxGeometry {
    pub fn new(pt1: Point, pt2: Point) -> Self {
        Self { pt1, pt2 }
    }

    /// Corners in order: top-left, top-right, bottom-right, bottom-left
    /// (relative to `pt1`/`pt2`, not to screen orientation).
    pub fn corners(&self) -> [Point; 4] {
        [
            self.pt1,
            Point::new(self.pt2.x, self.pt1.y),
            self.pt2,
            Point::new(self.pt1.x, self.pt2.y),
        ]
    }

    /// Move one corner, keeping the opposite corner fixed.
    pub fn move_corner(&mut self, corner: usize, to: Point) {
        match corner {
            0 => self.pt1 = to,
            1 => {
                self.pt2.x = to.x;
                self.pt1.y = to.y;
            }
            2 => self.pt2 = to,
            3 => {
                self.pt1.x = to.x;
                self.pt2.y = to.y;
            }
            _ => log::debug!("Ignoring move of unknown box corner {}", corner),
        }
    }

    pub fn width(&self) -> f64 {
        (self.pt2.x - self.pt1.x).abs()
    }

    pub fn height(&self) -> f64 {
        (self.pt2.y - self.pt1.y).abs()
    }
}

impl Region for BoxGeometry {
    fn hit_test(&self, screen: Point, viewport: &Viewport, tolerance: f64) -> Option<usize> {
        nearest_vertex(&self.corners(), screen, viewport, tolerance)
    }

    fn to_normalized(&self, _natural: Option<Dimensions>) -> Self {
        let a = self.pt1.clamped();
        let b = self.pt2.clamped();
        Self {
            pt1: Point::new(a.x.min(b.x), a.y.min(b.y)),
            pt2: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pt1.x > self.pt2.x || self.pt1.y > self.pt2.y {
            return Err(LabelerError::invalid_geometry("box", "corners are not ordered"));
        }
        if self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(LabelerError::invalid_geometry("box", "box has no area"));
        }
        Ok(())
    }
}

// ============================================================================
// Polygon
// ============================================================================

/// A polygon given by its vertices. The closing edge is implicit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonGeometry {
    pub points: Vec<Point>,
}

impl PolygonGeometry {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Number of pairwise distinct vertices.
    pub fn distinct_points(&self) -> usize {
        let mut seen: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if !seen.iter().any(|s| s.same_as(p)) {
                seen.push(*p);
            }
        }
        seen.len()
    }
}

impl Region for PolygonGeometry {
    fn hit_test(&self, screen: Point, viewport: &Viewport, tolerance: f64) -> Option<usize> {
        nearest_vertex(&self.points, screen, viewport, tolerance)
    }

    fn to_normalized(&self, _natural: Option<Dimensions>) -> Self {
        let mut points: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in self.points.iter().map(Point::clamped) {
            if points.last().is_some_and(|last| last.same_as(&p)) {
                continue;
            }
            points.push(p);
        }
        // A trailing copy of the first vertex is just an explicit close.
        if points.len() > 1 && points[0].same_as(&points[points.len() - 1]) {
            points.pop();
        }
        Self { points }
    }

    fn validate(&self) -> Result<()> {
        let distinct = self.distinct_points();
        if distinct < 3 {
            return Err(LabelerError::invalid_geometry(
                "polygon",
                format!("needs at least 3 distinct points, has {}", distinct),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Mask
// ============================================================================

/// A dense bitmap; every value is either 0 or 255.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub dimensions: Dimensions,
    pub values: Vec<u8>,
}

impl Mask {
    /// An all-empty mask of the given size.
    pub fn empty(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            values: vec![mask::OFF; dimensions.area()],
        }
    }

    /// Value at a pixel, `None` outside the bitmap.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        self.values
            .get(y as usize * self.dimensions.width as usize + x as usize)
            .copied()
    }

    /// Number of painted pixels.
    pub fn painted(&self) -> usize {
        self.values.iter().filter(|&&v| v == mask::ON).count()
    }

    /// Map a normalized point to continuous pixel coordinates of this bitmap.
    pub fn pixel_at(&self, normalized: Point) -> Point {
        Point::new(
            normalized.x * self.dimensions.width as f64,
            normalized.y * self.dimensions.height as f64,
        )
    }

    fn has_valid_buffer(&self) -> bool {
        !self.dimensions.is_empty() && self.values.len() == self.dimensions.area()
    }
}

impl Region for Mask {
    fn hit_test(&self, screen: Point, viewport: &Viewport, _tolerance: f64) -> Option<usize> {
        if !viewport.contains(screen) {
            return None;
        }
        let px = self.pixel_at(viewport.to_media(screen));
        let value = self.get(px.x.floor() as u32, px.y.floor() as u32)?;
        (value == mask::ON).then_some(0)
    }

    fn to_normalized(&self, natural: Option<Dimensions>) -> Self {
        if !self.has_valid_buffer() {
            return self.clone();
        }
        let binary = Mask {
            dimensions: self.dimensions,
            values: self
                .values
                .iter()
                .map(|&v| if v > mask::OFF { mask::ON } else { mask::OFF })
                .collect(),
        };
        match natural {
            Some(target) if target != self.dimensions && !target.is_empty() => {
                raster::resample_nearest(&binary, target)
            }
            _ => binary,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(LabelerError::invalid_geometry("mask", "mask has no pixels"));
        }
        if self.values.len() != self.dimensions.area() {
            return Err(LabelerError::invalid_geometry(
                "mask",
                format!(
                    "expected {} values for {}x{}, found {}",
                    self.dimensions.area(),
                    self.dimensions.width,
                    self.dimensions.height,
                    self.values.len()
                ),
            ));
        }
        if self.values.iter().any(|&v| v != mask::ON && v != mask::OFF) {
            return Err(LabelerError::invalid_geometry("mask", "values must be 0 or 255"));
        }
        Ok(())
    }
}

// ============================================================================
// Tagged geometry
// ============================================================================

/// Any region geometry, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionGeometry {
    Box(BoxGeometry),
    Polygon(PolygonGeometry),
    Mask(Mask),
}

impl RegionGeometry {
    pub fn kind(&self) -> RegionKind {
        match self {
            RegionGeometry::Box(_) => RegionKind::Box,
            RegionGeometry::Polygon(_) => RegionKind::Polygon,
            RegionGeometry::Mask(_) => RegionKind::Mask,
        }
    }
}

impl Region for RegionGeometry {
    fn hit_test(&self, screen: Point, viewport: &Viewport, tolerance: f64) -> Option<usize> {
        match self {
            RegionGeometry::Box(b) => b.hit_test(screen, viewport, tolerance),
            RegionGeometry::Polygon(p) => p.hit_test(screen, viewport, tolerance),
            RegionGeometry::Mask(m) => m.hit_test(screen, viewport, tolerance),
        }
    }

    fn to_normalized(&self, natural: Option<Dimensions>) -> Self {
        match self {
            RegionGeometry::Box(b) => RegionGeometry::Box(b.to_normalized(natural)),
            RegionGeometry::Polygon(p) => RegionGeometry::Polygon(p.to_normalized(natural)),
            RegionGeometry::Mask(m) => RegionGeometry::Mask(m.to_normalized(natural)),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            RegionGeometry::Box(b) => b.validate(),
            RegionGeometry::Polygon(p) => p.validate(),
            RegionGeometry::Mask(m) => m.validate(),
        }
    }
}

/// Index of the vertex nearest to `screen` within `tolerance` screen pixels.
fn nearest_vertex(
    vertices: &[Point],
    screen: Point,
    viewport: &Viewport,
    tolerance: f64,
) -> Option<usize> {
    vertices
        .iter()
        .enumerate()
        .map(|(i, v)| (i, viewport.to_screen(*v).distance_to(&screen)))
        .filter(|(_, d)| *d <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(Point::new(0.0, 0.0), 100.0, 200.0)
    }

    #[test]
    fn test_box_normalization_orders_corners() {
        let b = BoxGeometry::new(Point::new(0.5, 0.4), Point::new(0.1, 0.05));
        let n = b.to_normalized(None);
        assert_eq!(n.pt1, Point::new(0.1, 0.05));
        assert_eq!(n.pt2, Point::new(0.5, 0.4));
        assert!(n.is_complete());
        // Unnormalized boxes never pass validation.
        assert!(!b.is_complete());
    }

    #[test]
    fn test_box_normalization_clamps() {
        let b = BoxGeometry::new(Point::new(-0.2, 0.5), Point::new(1.3, 0.9));
        let n = b.to_normalized(None);
        assert_eq!(n.pt1.x, 0.0);
        assert_eq!(n.pt2.x, 1.0);
    }

    #[test]
    fn test_degenerate_box_rejected() {
        let p = Point::new(0.3, 0.3);
        let b = BoxGeometry::new(p, p).to_normalized(None);
        assert!(matches!(
            b.validate(),
            Err(LabelerError::InvalidGeometry { kind: "box", .. })
        ));
    }

    #[test]
    fn test_box_move_corner() {
        let mut b = BoxGeometry::new(Point::new(0.1, 0.1), Point::new(0.5, 0.5));
        b.move_corner(1, Point::new(0.7, 0.2));
        assert_eq!(b.pt1, Point::new(0.1, 0.2));
        assert_eq!(b.pt2, Point::new(0.7, 0.5));
        b.move_corner(3, Point::new(0.0, 0.9));
        assert_eq!(b.pt1, Point::new(0.0, 0.2));
        assert_eq!(b.pt2, Point::new(0.7, 0.9));
    }

    #[test]
    fn test_box_corner_hit_test_uses_screen_tolerance() {
        let b = BoxGeometry::new(Point::new(0.1, 0.05), Point::new(0.5, 0.4));
        // Corner 2 sits at (50, 80) on screen.
        assert_eq!(b.hit_test(Point::new(53.0, 83.0), &viewport(), 8.0), Some(2));
        assert_eq!(b.hit_test(Point::new(60.0, 90.0), &viewport(), 8.0), None);
    }

    #[test]
    fn test_polygon_requires_three_distinct_points() {
        let a = Point::new(0.1, 0.1);
        let b = Point::new(0.5, 0.1);
        let poly = PolygonGeometry::new(vec![a, b, b, a]);
        assert_eq!(poly.distinct_points(), 2);
        assert!(!poly.to_normalized(None).is_complete());

        let poly = PolygonGeometry::new(vec![a, b, Point::new(0.3, 0.6)]);
        assert!(poly.is_complete());
    }

    #[test]
    fn test_polygon_normalization_drops_duplicates() {
        let a = Point::new(0.1, 0.1);
        let b = Point::new(0.5, 0.1);
        let c = Point::new(0.3, 0.6);
        let poly = PolygonGeometry::new(vec![a, b, b, c, c, a]);
        assert_eq!(poly.to_normalized(None).points, vec![a, b, c]);
    }

    #[test]
    fn test_mask_validation() {
        let m = Mask::empty(Dimensions::new(4, 3));
        assert!(m.is_complete());

        let short = Mask {
            dimensions: Dimensions::new(4, 3),
            values: vec![0; 11],
        };
        assert!(!short.is_complete());

        let mut grey = Mask::empty(Dimensions::new(2, 2));
        grey.values[0] = 12;
        assert!(!grey.is_complete());
        assert!(grey.to_normalized(None).is_complete());
        assert_eq!(grey.to_normalized(None).values[0], 255);
    }

    #[test]
    fn test_mask_normalization_resamples_to_natural() {
        let mut m = Mask::empty(Dimensions::new(2, 2));
        m.values[3] = 255;
        let n = m.to_normalized(Some(Dimensions::new(4, 4)));
        assert_eq!(n.dimensions, Dimensions::new(4, 4));
        assert_eq!(n.painted(), 4);
        assert_eq!(n.get(3, 3), Some(255));
        assert_eq!(n.get(0, 0), Some(0));
    }

    #[test]
    fn test_mask_hit_test() {
        let mut m = Mask::empty(Dimensions::new(10, 20));
        // Pixel (5, 10) covers screen (50..60, 100..110) on the 100x200 viewport.
        m.values[10 * 10 + 5] = 255;
        assert_eq!(m.hit_test(Point::new(55.0, 105.0), &viewport(), 0.0), Some(0));
        assert_eq!(m.hit_test(Point::new(5.0, 5.0), &viewport(), 0.0), None);
    }

    #[test]
    fn test_tagged_geometry_dispatch() {
        let g = RegionGeometry::Polygon(PolygonGeometry::new(vec![Point::new(0.1, 0.1)]));
        assert_eq!(g.kind(), RegionKind::Polygon);
        assert!(!g.is_complete());
    }
}
