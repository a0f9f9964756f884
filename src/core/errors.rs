// Error types for the difference pipeline and its surrounding service
//
// Using thiserror so the core returns plain values that the transport layer
// can map to status codes, with source chaining preserved for logging.

use std::fmt;
use thiserror::Error;

/// Which of the two inputs an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Original,
    Modified,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Original => write!(f, "original"),
            ImageRole::Modified => write!(f, "modified"),
        }
    }
}

/// Settings parsing errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid color for {field}: '{value}' (expected 6 hex digits, e.g. #FF0000)")]
    InvalidColor { field: &'static str, value: String },
}

/// `data:` URL decoding errors
#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("missing 'data:' prefix")]
    MissingPrefix,

    #[error("missing ',' before the payload")]
    MissingSeparator,

    #[error("payload is not base64-encoded")]
    NotBase64,

    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Core pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to decode {input} image: {source}")]
    InvalidImage {
        input: ImageRole,
        #[source]
        source: image::ImageError,
    },

    #[error("The {input} image is empty (0 pixels)")]
    EmptyImage { input: ImageRole },

    #[error(
        "Image dimensions differ: original {}x{}, modified {}x{}",
        original.0, original.1, modified.0, modified.1
    )]
    DimensionMismatch {
        original: (u32, u32),
        modified: (u32, u32),
    },

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("Image encoding failed: {0}")]
    EncodingFailed(#[source] image::ImageError),

    #[error("Invalid data URL for {input} image: {source}")]
    InvalidDataUrl {
        input: ImageRole,
        #[source]
        source: DataUrlError,
    },

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl PipelineError {
    /// True when the failure is caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PipelineError::EncodingFailed(_) | PipelineError::TaskJoinFailed(_)
        )
    }
}

/// Results archive errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data URL for {entry}: {source}")]
    InvalidDataUrl {
        entry: &'static str,
        #[source]
        source: DataUrlError,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Upload limit must be > 0, got {0}")]
    InvalidUploadLimit(usize),

    #[error("Concurrent job limit must be > 0, got {0}")]
    InvalidJobLimit(usize),

    #[error("Unknown dimension policy '{0}' (expected 'resample' or 'reject')")]
    InvalidDimensionPolicy(String),

    #[error("Unknown distance metric '{0}' (expected 'luma' or 'max-channel')")]
    InvalidDistanceMetric(String),

    #[error("JPEG quality must be in [1, 100], got {0}")]
    InvalidJpegQuality(u8),

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type ArchiveResult<T> = Result<T, ArchiveError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = PipelineError::DimensionMismatch {
            original: (100, 80),
            modified: (120, 80),
        };
        assert_eq!(
            err.to_string(),
            "Image dimensions differ: original 100x80, modified 120x80"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_data_url_error_chain() {
        let err = PipelineError::InvalidDataUrl {
            input: ImageRole::Modified,
            source: DataUrlError::MissingSeparator,
        };
        assert_eq!(
            err.to_string(),
            "Invalid data URL for modified image: missing ',' before the payload"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_settings_error_is_client_error() {
        let err = PipelineError::from(SettingsError::InvalidColor {
            field: "circleColor",
            value: "red".to_string(),
        });
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
        assert_eq!(
            err.to_string(),
            "Invalid settings: Invalid color for circleColor: 'red' (expected 6 hex digits, e.g. #FF0000)"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_server_side_errors() {
        let err = PipelineError::TaskJoinFailed("cancelled".to_string());
        assert!(!err.is_client_error());
    }
}
