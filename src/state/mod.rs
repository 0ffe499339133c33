//! Editing state: drafts, pointer interaction, media loading and navigation.

mod cursor;
mod draft;
mod loader;
mod navigation;

pub use cursor::{Cursor, CursorMode, CursorOptions, KeyCommand, PointerEvent, PointerKind};
pub use draft::{DraftManager, DraftState};
pub use loader::{
    FileMediaSource, Layout, LoadState, LoadTicket, MediaLoader, MediaSource, MediaState,
    Resolved, ResolverThread,
};
pub use navigation::Navigator;
