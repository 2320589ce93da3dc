use std::path::PathBuf;
use thiserror::Error;

pub type DetectResult<T> = Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("ROI {x},{y} {w}x{h} out of bounds for {frame_width}x{frame_height} frame")]
    RoiOutOfBounds {
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("Decoder unavailable: {0}")]
    DecodeUnavailable(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Errors that leave the whole engine inoperable and must abort a batch run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DetectError::DecodeUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_decode_unavailable_is_fatal() {
        assert!(DetectError::DecodeUnavailable("ffmpeg".into()).is_fatal());
        assert!(!DetectError::ProfileNotFound("x".into()).is_fatal());
        assert!(!DetectError::decode("bad frame").is_fatal());
        assert!(!DetectError::Cancelled.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = DetectError::ProfileNotFound("nope".into());
        assert_eq!(err.to_string(), "Profile not found: nope");
    }
}
