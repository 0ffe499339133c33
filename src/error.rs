//! Error types for the labeling engine.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LabelerError>;

/// Errors that can occur while loading media, committing drafts or talking to the host.
///
/// Interaction-level problems (a click outside the canvas, a failed hit-test) are
/// never reported through this type; they are absorbed as no-ops by the cursor.
#[derive(Error, Debug)]
pub enum LabelerError {
    /// Media URL could not be reached or decoded.
    #[error("Failed to load media '{url}': {message}")]
    MediaLoad {
        /// The URL that was requested
        url: String,
        /// Description of the failure
        message: String,
    },

    /// A region failed its geometry invariant.
    #[error("Invalid {kind} geometry: {reason}")]
    InvalidGeometry {
        /// Region kind ("box", "polygon", "mask")
        kind: &'static str,
        /// Why the region was rejected
        reason: String,
    },

    /// An element the engine needs (loaded media, open item) is absent.
    ///
    /// This indicates a lifecycle bug in the caller, not bad user input.
    #[error("Missing reference: {what}")]
    MissingRef {
        /// What was expected to be present
        what: &'static str,
    },

    /// The host asked for a combination that cannot be presented.
    #[error("Unsupported presentation: {0}")]
    UnsupportedPresentation(String),

    /// Settings file written by a newer version.
    #[error("Settings version {found} is newer than supported version {supported}")]
    SettingsVersion {
        /// Version found in the file
        found: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoder error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl LabelerError {
    /// Create a media load error.
    pub fn media_load(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MediaLoad {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid geometry error.
    pub fn invalid_geometry(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a missing reference error.
    pub fn missing_ref(what: &'static str) -> Self {
        Self::MissingRef { what }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LabelerError::media_load("a.png", "not found");
        assert_eq!(err.to_string(), "Failed to load media 'a.png': not found");

        let err = LabelerError::invalid_geometry("polygon", "only 2 points");
        assert_eq!(err.to_string(), "Invalid polygon geometry: only 2 points");

        let err = LabelerError::missing_ref("media dimensions");
        assert_eq!(err.to_string(), "Missing reference: media dimensions");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: LabelerError = parse.unwrap_err().into();
        assert!(matches!(err, LabelerError::Json(_)));
    }
}
