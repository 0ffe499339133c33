//! Mask raster engine.
//!
//! Paints and erases discs into mask bitmaps, resamples masks between canvas
//! and natural resolution, and renders masks into translucent RGBA overlays.
//! All resampling is nearest-neighbour so edits stay pixel-exact.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, Slice};

use crate::constants::mask;
use crate::model::{Dimensions, Mask, Point};

/// Deterministic overlay color for the mask at `index`.
pub fn palette_color(index: usize) -> [u8; 3] {
    mask::PALETTE[index % mask::PALETTE.len()]
}

/// Paint a filled disc into a mask.
///
/// `center` and `radius` are in mask pixels; a pixel is covered when its
/// centre lies within the disc. Pixels outside the bitmap are clipped.
/// Returns the number of pixels whose value changed.
pub fn paint_disc(target: &mut Mask, center: Point, radius: f64, value: u8) -> usize {
    let Dimensions { width, height } = target.dimensions;
    let Ok(mut view) =
        ArrayViewMut2::from_shape((height as usize, width as usize), &mut target.values)
    else {
        log::debug!(
            "Skipping paint on malformed {}x{} mask ({} values)",
            width,
            height,
            target.values.len()
        );
        return 0;
    };
    if radius <= 0.0 {
        return 0;
    }

    let x0 = (center.x - radius).floor().max(0.0) as usize;
    let y0 = (center.y - radius).floor().max(0.0) as usize;
    let x1 = ((center.x + radius).ceil().max(0.0) as usize).min(width as usize);
    let y1 = ((center.y + radius).ceil().max(0.0) as usize).min(height as usize);
    if x0 >= x1 || y0 >= y1 {
        return 0;
    }

    let r2 = radius * radius;
    let mut changed = 0;
    view.slice_axis_inplace(Axis(0), Slice::from(y0..y1));
    view.slice_axis_inplace(Axis(1), Slice::from(x0..x1));
    for ((row, col), pixel) in view.indexed_iter_mut() {
        let dx = (x0 + col) as f64 + 0.5 - center.x;
        let dy = (y0 + row) as f64 + 0.5 - center.y;
        if dx * dx + dy * dy <= r2 && *pixel != value {
            *pixel = value;
            changed += 1;
        }
    }
    changed
}

/// Nearest-neighbour resample of a mask to new dimensions.
///
/// A mask whose buffer does not match its dimensions is returned unchanged.
pub fn resample_nearest(source: &Mask, target: Dimensions) -> Mask {
    let Dimensions { width, height } = source.dimensions;
    let Ok(view) = ArrayView2::from_shape((height as usize, width as usize), &source.values)
    else {
        return source.clone();
    };
    if target.is_empty() || source.dimensions.is_empty() {
        return source.clone();
    }

    let sx = width as f64 / target.width as f64;
    let sy = height as f64 / target.height as f64;
    let resampled = Array2::from_shape_fn(
        (target.height as usize, target.width as usize),
        |(ty, tx)| {
            let x = (((tx as f64 + 0.5) * sx) as usize).min(width as usize - 1);
            let y = (((ty as f64 + 0.5) * sy) as usize).min(height as usize - 1);
            view[[y, x]]
        },
    );

    Mask {
        dimensions: target,
        values: resampled.iter().copied().collect(),
    }
}

/// Render a mask at its native resolution as an RGBA overlay.
///
/// Painted pixels get `color` at half opacity, everything else is transparent.
pub fn render_overlay(source: &Mask, color: [u8; 3]) -> RgbaImage {
    let Dimensions { width, height } = source.dimensions;
    let on = Rgba([color[0], color[1], color[2], mask::OVERLAY_ALPHA]);
    let off = Rgba([0, 0, 0, 0]);
    RgbaImage::from_fn(width, height, |x, y| match source.get(x, y) {
        Some(mask::ON) => on,
        _ => off,
    })
}

/// Scale an overlay to the display container without smoothing.
pub fn scale_overlay(overlay: &RgbaImage, display: Dimensions) -> RgbaImage {
    if display.is_empty() || (overlay.width(), overlay.height()) == (display.width, display.height)
    {
        return overlay.clone();
    }
    imageops::resize(overlay, display.width, display.height, FilterType::Nearest)
}

/// Content fingerprint of a mask, used to skip redundant re-renders.
pub fn fingerprint(source: &Mask) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.dimensions.hash(&mut hasher);
    source.values.hash(&mut hasher);
    hasher.finish()
}

struct CachedOverlay {
    fingerprint: u64,
    color: [u8; 3],
    image: RgbaImage,
}

/// Per-mask overlay cache.
///
/// An overlay is re-rendered only when its bitmap or its color changes; other
/// draft mutations leave the cached image untouched.
#[derive(Default)]
pub struct OverlayCache {
    entries: Vec<Option<CachedOverlay>>,
    renders: usize,
}

impl OverlayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay for the mask at `index`, rendering it if stale.
    pub fn overlay(&mut self, index: usize, source: &Mask) -> &RgbaImage {
        let color = palette_color(index);
        let print = fingerprint(source);
        if self.entries.len() <= index {
            self.entries.resize_with(index + 1, || None);
        }

        let entry = &mut self.entries[index];
        if !matches!(entry, Some(cached) if cached.fingerprint == print && cached.color == color) {
            *entry = None;
        }

        let renders = &mut self.renders;
        &entry
            .get_or_insert_with(|| {
                log::trace!("Rendering overlay for mask {}", index);
                *renders += 1;
                CachedOverlay {
                    fingerprint: print,
                    color,
                    image: render_overlay(source, color),
                }
            })
            .image
    }

    /// Drop overlays for masks that no longer exist.
    pub fn truncate(&mut self, count: usize) {
        self.entries.truncate(count);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Total renders performed, for diagnostics.
    pub fn render_count(&self) -> usize {
        self.renders
    }
}
