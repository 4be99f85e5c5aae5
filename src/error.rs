//! Engine error type.
//!
//! Every stage of the query pipeline returns [`TimesheetError`] so callers can
//! tell a missing file from a broken document, a schema violation, a bad
//! timestamp or a bad filter window without inspecting message text. The
//! engine never wraps one kind in another.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimesheetError {
    /// Source file does not exist or could not be read.
    #[error("file {} not found or unreadable: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Document is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    MalformedXml { position: u64, message: String },

    /// Well-formed XML that does not follow the people/person/start/end shape.
    #[error("schema violation at byte {position}: {message}")]
    Schema { position: u64, message: String },

    /// Timestamp or date does not match its fixed format.
    #[error("invalid value {value:?}: expected format {expected}")]
    Parse {
        value: String,
        expected: &'static str,
    },

    /// Filter window is malformed or inverted.
    #[error("invalid date range: {0}")]
    InvalidRange(String),
}

pub type Result<T> = std::result::Result<T, TimesheetError>;

impl TimesheetError {
    pub(crate) fn schema(position: u64, message: impl Into<String>) -> Self {
        Self::Schema {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::MalformedXml {
            position,
            message: message.into(),
        }
    }

    /// Map a quick-xml failure onto the engine's error kinds. I/O failures
    /// mid-stream mean the file became unreadable.
    pub(crate) fn from_xml(err: quick_xml::Error, position: u64, origin: &std::path::Path) -> Self {
        match err {
            quick_xml::Error::Io(io_err) => Self::NotFound {
                path: origin.to_path_buf(),
                source: io::Error::new(io_err.kind(), io_err.to_string()),
            },
            other => Self::malformed(position, other.to_string()),
        }
    }

    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MalformedXml { .. } => "malformed_xml",
            Self::Schema { .. } => "schema",
            Self::Parse { .. } => "parse",
            Self::InvalidRange(_) => "invalid_range",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_failure_maps_to_not_found() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = TimesheetError::from_xml(
            quick_xml::Error::Io(std::sync::Arc::new(io_err)),
            12,
            std::path::Path::new("sheet.xml"),
        );
        assert!(matches!(err, TimesheetError::NotFound { .. }));
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("sheet.xml"));
    }

    #[test]
    fn test_display_includes_position() {
        let err = TimesheetError::schema(40, "missing <end> in person #1");
        assert_eq!(
            err.to_string(),
            "schema violation at byte 40: missing <end> in person #1"
        );
    }
}
