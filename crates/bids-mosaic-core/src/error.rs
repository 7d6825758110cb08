//! Error type shared by the mosaic pipeline stages.

use std::path::PathBuf;
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::report::ReportError;
use crate::volume::VolumeError;

/// Errors that terminate a mosaic run.
///
/// Per-volume decode failures never surface here: the renderer logs them and
/// moves on. Everything in this enum aborts the run.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("Dataset directory not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Image directory not found: {}", .0.display())]
    ImageDirNotFound(PathBuf),

    #[error("Nothing to do: no dataset or pre-rendered image directory given")]
    NoInput,

    #[error("Invalid downsample factor: {0} (must be at least 1)")]
    InvalidDownsample(u32),

    #[error("Invalid metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mosaic operations
pub type Result<T> = std::result::Result<T, MosaicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = MosaicError::DatasetNotFound(PathBuf::from("/no/such/ds"));
        assert_eq!(err.to_string(), "Dataset directory not found: /no/such/ds");
    }

    #[test]
    fn test_metadata_error_converts() {
        let err: MosaicError = MetadataError::NotAnObject("array").into();
        assert!(matches!(err, MosaicError::Metadata(_)));
        assert!(err.to_string().starts_with("Invalid metadata"));
    }
}
