//! Error types for the region-censor crate.

use std::path::PathBuf;

/// Errors that can occur while detecting, censoring, loading or saving images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No detector is available, so no regions can be found.
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// An input image could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying codec error.
        source: image::ImageError,
    },

    /// A processed image could not be encoded or written.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        /// Destination that failed to encode.
        path: PathBuf,
        /// Underlying codec error.
        source: image::ImageError,
    },

    /// A detections file could not be read or parsed.
    #[error("invalid detections file {}: {message}", path.display())]
    DetectionsFile {
        /// The offending file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An input path or parameter was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A background batch worker stopped without producing a report.
    #[error("batch worker failed: {0}")]
    Worker(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("gif".to_string());
        assert!(unsupported.to_string().contains("gif"));

        let unavailable = Error::DetectorUnavailable("model missing".to_string());
        assert!(unavailable.to_string().contains("model missing"));

        let bad_file = Error::DetectionsFile {
            path: PathBuf::from("boxes.json"),
            message: "expected array".to_string(),
        };
        let msg = bad_file.to_string();
        assert!(msg.contains("boxes.json"));
        assert!(msg.contains("expected array"));
    }
}
