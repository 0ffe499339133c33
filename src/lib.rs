//! Labeler - draft and region-editing engine for image and video labeling widgets.
//!
//! The engine keeps committed labels and the working draft apart, turns
//! pointer events into box, polygon and mask edits, paints masks, and walks a
//! batch of items through their lifecycle. Rendering and transport belong to
//! the host; the [`Session`] only consumes [`HostState`] pushes and input
//! events and hands back [`HostUpdate`]s.

pub mod constants;
pub mod error;
pub mod host;
pub mod model;
pub mod raster;
pub mod session;
pub mod settings;
pub mod state;
pub mod viewport;

#[cfg(test)]
mod tests;

pub use error::{LabelerError, Result};
pub use host::{HostState, HostUpdate};
pub use session::{Command, InputEvent, LogNotifier, Notifier, Presentation, Session};
pub use settings::{LabelerSettings, LogLevel};
