//! Data models: geometry, label documents, label schema and media items.

mod config;
mod geometry;
mod item;
mod labels;

pub use config::{Config, ConfigScope, LabelConfig, LabelOption};
pub use geometry::{
    BoxGeometry, Dimensions, Mask, Point, PolygonGeometry, Region, RegionGeometry, RegionKind,
};
pub use item::{Action, ItemState, MediaItem, MediaType};
pub use labels::{HostLabels, LabelDocument, LabelMap, RegionLabel, TimestampedLabel};
