//! Centralized error types for mailpress.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single attachment could not be normalized to PDF.
///
/// These never abort a message: they are recorded next to the attachment
/// and the merge continues with whatever did convert.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionFailure {
    /// No capability class handles this extension.
    #[error("unsupported attachment type '{0}'")]
    UnsupportedType(String),

    /// The bytes claim to be a PDF but cannot be parsed as one.
    #[error("corrupt PDF: {0}")]
    CorruptPdf(String),

    /// The bytes cannot be decoded as the image format their extension names.
    #[error("corrupt image: {0}")]
    CorruptImage(String),

    /// The office-document renderer is not installed or could not be started.
    #[error("converter unavailable: {0}")]
    ConverterUnavailable(String),

    /// The source decoded fine but producing the PDF pages failed.
    #[error("rendering failed: {0}")]
    RenderFailed(String),
}

impl ConversionFailure {
    /// Stable short code used in logs and reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "unsupported-type",
            Self::CorruptPdf(_) => "corrupt-pdf",
            Self::CorruptImage(_) => "corrupt-image",
            Self::ConverterUnavailable(_) => "converter-unavailable",
            Self::RenderFailed(_) => "render-failed",
        }
    }
}

/// All errors produced by the mailpress library outside of per-attachment
/// conversion.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Building or parsing a PDF document failed.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// A generated or merged PDF could not be serialized.
    #[error("cannot write PDF: {0}")]
    PdfWrite(String),

    /// The leading body page(s) of a message could not be rendered.
    #[error("cannot render message body: {0}")]
    BodyRender(String),

    /// A run report could not be serialized.
    #[error("cannot serialize report: {0}")]
    Report(#[from] serde_json::Error),

    /// The run cannot start (or continue) at all.
    #[error("cannot run pipeline: {0}")]
    FatalPrecondition(String),

    /// A run is already in progress on this controller.
    #[error("a run is already in progress")]
    AlreadyRunning,
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes() {
        assert_eq!(
            ConversionFailure::UnsupportedType("xyz".into()).code(),
            "unsupported-type"
        );
        assert_eq!(ConversionFailure::CorruptPdf("x".into()).code(), "corrupt-pdf");
        assert_eq!(
            ConversionFailure::ConverterUnavailable("x".into()).code(),
            "converter-unavailable"
        );
    }

    #[test]
    fn test_json_errors_are_report_errors() {
        let err: ArchiveError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, ArchiveError::Report(_)));
        assert!(err.to_string().starts_with("cannot serialize report"));
    }

    #[test]
    fn test_io_helper_keeps_path() {
        let err = ArchiveError::io(
            "/tmp/out.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/out.pdf"));
    }
}
