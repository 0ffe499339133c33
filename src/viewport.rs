//! Screen ↔ media coordinate mapping.
//!
//! Pointer events arrive in screen (canvas) pixels. Geometry is stored in
//! normalized media space, so every edit and every render goes through the
//! two functions here:
//!
//! ```text
//! media  = (screen - origin) / display_size
//! screen = media * display_size + origin
//! ```
//!
//! `display_size` is the on-screen size of the whole media item, which already
//! folds in both the natural media size and the configured maximum canvas size
//! (see [`canvas_scale`]).

use crate::model::{Dimensions, Point};

/// Scale factor from natural media pixels to canvas pixels.
///
/// The canvas keeps the media aspect ratio and never upsamples: the longer
/// side is shrunk to `max_canvas_size` when it is larger.
pub fn canvas_scale(natural: Dimensions, max_canvas_size: u32) -> f64 {
    let longest = natural.width.max(natural.height);
    if longest == 0 || max_canvas_size == 0 {
        return 1.0;
    }
    (max_canvas_size as f64 / longest as f64).min(1.0)
}

/// Pixel size of the drawing canvas (and of freshly created masks).
pub fn canvas_dimensions(natural: Dimensions, max_canvas_size: u32) -> Dimensions {
    let scale = canvas_scale(natural, max_canvas_size);
    Dimensions::new(
        ((natural.width as f64 * scale).round() as u32).max(1),
        ((natural.height as f64 * scale).round() as u32).max(1),
    )
}

/// Where the media is drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Screen position of the media's top-left corner.
    pub origin: Point,
    /// On-screen width of the full media item.
    pub width: f64,
    /// On-screen height of the full media item.
    pub height: f64,
}

impl Viewport {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// Viewport showing the media at canvas size with its corner at `origin`.
    pub fn fit(natural: Dimensions, max_canvas_size: u32, origin: Point) -> Self {
        let canvas = canvas_dimensions(natural, max_canvas_size);
        Self::new(origin, canvas.width as f64, canvas.height as f64)
    }

    /// Screen position to normalized media coordinates (not clamped).
    pub fn to_media(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.origin.x) / self.width,
            (screen.y - self.origin.y) / self.height,
        )
    }

    /// Normalized media coordinates to screen position.
    pub fn to_screen(&self, media: Point) -> Point {
        Point::new(
            media.x * self.width + self.origin.x,
            media.y * self.height + self.origin.y,
        )
    }

    /// Whether a screen position lies on the media.
    pub fn contains(&self, screen: Point) -> bool {
        self.is_valid()
            && screen.x >= self.origin.x
            && screen.x <= self.origin.x + self.width
            && screen.y >= self.origin.y
            && screen.y <= self.origin.y + self.height
    }

    /// Convert a length in screen pixels to pixels of a bitmap of `target` size.
    pub fn screen_length_to_pixels(&self, length: f64, target: Dimensions) -> f64 {
        if !self.is_valid() {
            return length;
        }
        length * target.width as f64 / self.width
    }

    /// A viewport with no area cannot map anything.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}
