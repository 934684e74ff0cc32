//! Office documents, delegated to an external renderer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

use super::Artifact;
use crate::error::ConversionFailure;
use crate::model::attachment::Attachment;
use crate::pdf::merge;

/// Why the renderer produced no PDF.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer is not installed, not configured, or cannot be started.
    #[error("{0}")]
    Unavailable(String),

    /// The renderer ran but did not produce a document.
    #[error("{0}")]
    Failed(String),
}

/// Something that turns an office document into PDF bytes.
///
/// Implementations need not be thread-safe: the pipeline creates and uses
/// its renderer on one thread.
pub trait DocumentRenderer {
    fn render(&self, attachment: &Attachment) -> Result<Vec<u8>, RenderError>;
}

/// Renderer used when no office suite is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRenderer;

impl DocumentRenderer for UnavailableRenderer {
    fn render(&self, _attachment: &Attachment) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Unavailable(
            "no office document renderer configured".to_string(),
        ))
    }
}

/// Runs an office suite in headless mode (LibreOffice's `soffice` by default).
///
/// The attachment is written to a scratch directory that is removed when
/// the call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for CommandRenderer {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl DocumentRenderer for CommandRenderer {
    fn render(&self, attachment: &Attachment) -> Result<Vec<u8>, RenderError> {
        let scratch = tempfile::tempdir()
            .map_err(|e| RenderError::Failed(format!("cannot create scratch directory: {e}")))?;
        let input = scratch.path().join(format!("input.{}", attachment.extension));
        std::fs::write(&input, &attachment.content)
            .map_err(|e| RenderError::Failed(format!("cannot stage attachment: {e}")))?;

        debug!(program = %self.program.display(), file = %attachment.filename, "running office renderer");
        let output = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::Unavailable(format!("'{}' not found", self.program.display()))
                } else {
                    RenderError::Unavailable(format!(
                        "cannot start '{}': {e}",
                        self.program.display()
                    ))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "office renderer failed");
            return Err(RenderError::Failed(format!(
                "renderer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        std::fs::read(scratch.path().join("input.pdf"))
            .map_err(|_| RenderError::Failed("renderer produced no PDF".to_string()))
    }
}

/// Render through `renderer` and validate what comes back.
///
/// A renderer that panics fails this attachment only.
pub fn convert(
    renderer: &dyn DocumentRenderer,
    attachment: &Attachment,
) -> Result<Artifact, ConversionFailure> {
    let rendered = catch_unwind(AssertUnwindSafe(|| renderer.render(attachment))).map_err(|panic| {
        warn!(file = %attachment.filename, "office renderer panicked");
        ConversionFailure::RenderFailed(format!("renderer crashed: {}", panic_reason(&panic)))
    })?;
    let bytes = rendered.map_err(|e| match e {
        RenderError::Unavailable(reason) => ConversionFailure::ConverterUnavailable(reason),
        RenderError::Failed(reason) => ConversionFailure::RenderFailed(reason),
    })?;
    let loaded = merge::load(&bytes).map_err(ConversionFailure::CorruptPdf)?;
    Ok(Artifact {
        bytes,
        page_count: loaded.page_count,
    })
}

fn panic_reason(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
