//! Global constants for the labeling engine.
//!
//! Pointer tolerances are expressed in screen pixels; they are converted to
//! media space through the current display scale wherever they are used.

/// Pointer interaction thresholds.
pub mod pointer {
    /// Distance (screen px) within which a corner or vertex can be grabbed.
    pub const HIT_TOLERANCE: f64 = 8.0;
    /// Distance (screen px) within which a click on the first vertex closes a polygon.
    pub const POLYGON_CLOSE_TOLERANCE: f64 = 8.0;
    /// Two normalized points closer than this are treated as the same vertex.
    pub const POINT_EPSILON: f64 = 1e-9;
}

/// Mask painting and overlay constants.
pub mod mask {
    /// Brush radius for mask painting (screen px).
    pub const BRUSH_RADIUS: f64 = 10.0;
    /// Pixel value for a painted mask pixel.
    pub const ON: u8 = 255;
    /// Pixel value for an empty mask pixel.
    pub const OFF: u8 = 0;
    /// Overlay alpha for painted pixels (about 50%).
    pub const OVERLAY_ALPHA: u8 = 127;
    /// Overlay colors, assigned to masks by index.
    pub const PALETTE: [[u8; 3]; 3] = [[255, 0, 0], [0, 0, 255], [255, 255, 0]];
}

/// Canvas sizing constants.
pub mod canvas {
    /// Default longest side (px) of the drawing canvas, matching the host default.
    pub const DEFAULT_MAX_SIZE: u32 = 512;
}

/// Current settings file format version.
pub const SETTINGS_VERSION: u32 = 1;
