//! Attachment converter dispatcher.
//!
//! Every attachment is normalized to a PDF artifact by exactly one
//! [`CapabilityClass`], chosen by its lower-cased extension. Conversion never
//! panics or aborts the caller: problems come back as
//! [`ConversionOutcome::Failure`] with a [`ConversionFailure`] reason.

pub mod image;
pub mod office;
pub mod text;

use tracing::debug;

use crate::error::ConversionFailure;
use crate::model::attachment::Attachment;
use crate::pdf::layout::PageSize;
use crate::pdf::merge;

pub use office::{CommandRenderer, DocumentRenderer, RenderError, UnavailableRenderer};

/// Extensions rendered as a single full-size image page.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// Extensions handed to the office-document renderer.
pub const OFFICE_EXTENSIONS: &[&str] = &[
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf",
];

/// Extensions rendered as monospace text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "csv", "log", "text"];

/// Conversion strategy selected by attachment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityClass {
    DirectPdf,
    RasterImage,
    OfficeDocument,
    PlainText,
}

impl CapabilityClass {
    /// Map a lower-cased extension (without the dot) to its class.
    pub fn for_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(Self::DirectPdf),
            ext if IMAGE_EXTENSIONS.contains(&ext) => Some(Self::RasterImage),
            ext if OFFICE_EXTENSIONS.contains(&ext) => Some(Self::OfficeDocument),
            ext if TEXT_EXTENSIONS.contains(&ext) => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DirectPdf => "direct-pdf",
            Self::RasterImage => "raster-image",
            Self::OfficeDocument => "office-document",
            Self::PlainText => "plain-text",
        }
    }
}

impl std::fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Layout settings for generated pages.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub page_size: PageSize,

    /// Characters per line for monospace text.
    pub text_wrap_width: usize,

    /// Font size for monospace text, in points.
    pub text_font_size: f32,

    /// Resolution assumed for images without physical size, in dots per inch.
    pub image_dpi: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            text_wrap_width: 90,
            text_font_size: 9.0,
            image_dpi: 96.0,
        }
    }
}

/// A normalized PDF produced from one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Result of converting a single attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success(Artifact),
    Failure(ConversionFailure),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<&ConversionFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }
}

impl From<Result<Artifact, ConversionFailure>> for ConversionOutcome {
    fn from(result: Result<Artifact, ConversionFailure>) -> Self {
        match result {
            Ok(artifact) => Self::Success(artifact),
            Err(reason) => Self::Failure(reason),
        }
    }
}

/// Routes attachments to their converter.
///
/// Owns the office-document renderer; both live on the pipeline thread.
pub struct Dispatcher {
    renderer: Box<dyn DocumentRenderer>,
    options: RenderOptions,
}

impl Dispatcher {
    pub fn new(renderer: Box<dyn DocumentRenderer>, options: RenderOptions) -> Self {
        Self { renderer, options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Normalize one attachment to PDF. Pure apart from the renderer call.
    pub fn convert(&self, attachment: &Attachment) -> ConversionOutcome {
        let Some(class) = CapabilityClass::for_extension(&attachment.extension) else {
            let ext = if attachment.extension.is_empty() {
                "(none)".to_string()
            } else {
                attachment.extension.clone()
            };
            return ConversionOutcome::Failure(ConversionFailure::UnsupportedType(ext));
        };

        let result = match class {
            CapabilityClass::DirectPdf => validate_pdf(&attachment.content),
            CapabilityClass::RasterImage => image::convert(attachment, &self.options),
            CapabilityClass::OfficeDocument => office::convert(self.renderer.as_ref(), attachment),
            CapabilityClass::PlainText => text::convert(attachment, &self.options),
        };

        match &result {
            Ok(artifact) => debug!(
                file = %attachment.filename,
                class = %class,
                pages = artifact.page_count,
                "attachment converted"
            ),
            Err(reason) => debug!(
                file = %attachment.filename,
                class = %class,
                code = reason.code(),
                "attachment not converted: {reason}"
            ),
        }
        result.into()
    }
}

/// PDF passthrough: keep the bytes as they are once they parse.
fn validate_pdf(bytes: &[u8]) -> Result<Artifact, ConversionFailure> {
    let loaded = merge::load(bytes).map_err(ConversionFailure::CorruptPdf)?;
    Ok(Artifact {
        bytes: bytes.to_vec(),
        page_count: loaded.page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::layout::{Font, PageItem};
    use crate::pdf::writer::PdfBuilder;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Box::new(UnavailableRenderer), RenderOptions::default())
    }

    fn sample_pdf() -> Vec<u8> {
        let mut builder = PdfBuilder::new();
        builder
            .add_text_page(&[PageItem::text("x", Font::Regular, 12.0)], PageSize::A4)
            .unwrap();
        builder.finish(PageSize::A4).unwrap()
    }

    #[test]
    fn test_extension_classes() {
        assert_eq!(CapabilityClass::for_extension("pdf"), Some(CapabilityClass::DirectPdf));
        assert_eq!(CapabilityClass::for_extension("jpeg"), Some(CapabilityClass::RasterImage));
        assert_eq!(CapabilityClass::for_extension("docx"), Some(CapabilityClass::OfficeDocument));
        assert_eq!(CapabilityClass::for_extension("csv"), Some(CapabilityClass::PlainText));
        assert_eq!(CapabilityClass::for_extension("xyz"), None);
        assert_eq!(CapabilityClass::for_extension(""), None);
    }

    #[test]
    fn test_extension_sets_are_disjoint() {
        for ext in IMAGE_EXTENSIONS {
            assert!(!OFFICE_EXTENSIONS.contains(ext) && !TEXT_EXTENSIONS.contains(ext));
        }
        for ext in OFFICE_EXTENSIONS {
            assert!(!TEXT_EXTENSIONS.contains(ext));
        }
    }

    #[test]
    fn test_unknown_extension_is_recorded() {
        let att = Attachment::new("data.xyz", "application/octet-stream", vec![1, 2, 3]);
        assert_eq!(
            dispatcher().convert(&att),
            ConversionOutcome::Failure(ConversionFailure::UnsupportedType("xyz".into()))
        );
    }

    #[test]
    fn test_missing_extension_is_unsupported() {
        let att = Attachment::new("README", "text/plain", b"hi".to_vec());
        let outcome = dispatcher().convert(&att);
        assert_eq!(outcome.failure().map(|f| f.code()), Some("unsupported-type"));
    }

    #[test]
    fn test_pdf_passthrough_keeps_bytes() {
        let bytes = sample_pdf();
        let att = Attachment::new("Invoice.PDF", "application/pdf", bytes.clone());
        match dispatcher().convert(&att) {
            ConversionOutcome::Success(artifact) => {
                assert_eq!(artifact.bytes, bytes);
                assert_eq!(artifact.page_count, 1);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_pdf() {
        let att = Attachment::new("bad.pdf", "application/pdf", b"%PDF-1.4 garbage".to_vec());
        let outcome = dispatcher().convert(&att);
        assert_eq!(outcome.failure().map(|f| f.code()), Some("corrupt-pdf"));
    }

    #[test]
    fn test_office_without_renderer_is_unavailable() {
        let att = Attachment::new("report.docx", "application/msword", vec![0; 16]);
        let outcome = dispatcher().convert(&att);
        assert_eq!(
            outcome.failure().map(|f| f.code()),
            Some("converter-unavailable")
        );
    }

    #[test]
    fn test_dispatch_is_idempotent() {
        let d = dispatcher();
        let inputs = [
            Attachment::new("a.pdf", "application/pdf", sample_pdf()),
            Attachment::new("b.txt", "text/plain", b"hello".to_vec()),
            Attachment::new("c.png", "image/png", b"not a png".to_vec()),
            Attachment::new("d.xyz", "application/octet-stream", vec![]),
        ];
        for att in &inputs {
            let first = d.convert(att);
            let second = d.convert(att);
            assert_eq!(first.is_success(), second.is_success(), "{}", att.filename);
            assert_eq!(first.failure(), second.failure(), "{}", att.filename);
        }
    }
}
