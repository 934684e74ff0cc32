//! Document merge engine: one archived PDF per message.
//!
//! The output always starts with the message's own page(s) (metadata,
//! attachment summary, body). Successfully converted attachments follow in
//! their original order; failed ones are listed on the body page and left
//! out. Only a failure to produce the body pages, or to write the file,
//! fails the whole message.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use humansize::{format_size, DECIMAL};
use lopdf::Document;
use tracing::{debug, warn};

use super::naming::{archive_file_name, NameRegistry};
use crate::convert::{ConversionOutcome, RenderOptions};
use crate::error::{ArchiveError, Result};
use crate::model::message::Message;
use crate::pdf::layout::{paginate, text_items, Font, PageItem, MARGIN};
use crate::pdf::merge::{self, merge_documents};
use crate::pdf::writer::PdfBuilder;

/// Date format used on body pages when none (or a broken one) is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M %Z";

const TITLE_SIZE: f32 = 16.0;
const HEADER_SIZE: f32 = 10.5;
const FOOTER_SIZE: f32 = 8.0;

/// Average Helvetica glyph width as a fraction of the font size.
const PROPORTIONAL_CHAR_WIDTH: f32 = 0.5;

/// Outcome of merging one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    Success {
        path: PathBuf,
        page_count: usize,
        /// Attachments actually included in the output.
        included: usize,
        /// Attachments the message had.
        total: usize,
    },
    Failure {
        reason: String,
        /// Attachments that had converted before the merge gave up.
        included: usize,
    },
}

impl MergeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn included(&self) -> usize {
        match self {
            Self::Success { included, .. } | Self::Failure { included, .. } => *included,
        }
    }
}

/// Builds and writes the per-message archive PDFs of a run.
pub struct MergeEngine {
    output_dir: PathBuf,
    names: NameRegistry,
    render: RenderOptions,
    date_format: String,
}

impl MergeEngine {
    /// `output_dir` must exist; the engine never creates directories.
    ///
    /// An invalid `date_format` is replaced by [`DEFAULT_DATE_FORMAT`].
    pub fn new(output_dir: impl Into<PathBuf>, render: RenderOptions, date_format: impl Into<String>) -> Self {
        let mut date_format = date_format.into();
        if !is_valid_date_format(&date_format) {
            warn!(format = %date_format, "invalid date format, using default");
            date_format = DEFAULT_DATE_FORMAT.to_string();
        }
        Self {
            output_dir: output_dir.into(),
            names: NameRegistry::new(),
            render,
            date_format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Merge the body page(s) of `message` with its converted attachments.
    ///
    /// `outcomes` holds one entry per attachment, in attachment order.
    pub fn merge(&mut self, message: &Message, outcomes: &[ConversionOutcome]) -> MergeResult {
        let total = outcomes.len();
        let converted = outcomes.iter().filter(|o| o.is_success()).count();

        let body = match self.render_body(message, outcomes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(id = %message.id, error = %e, "body rendering failed");
                return MergeResult::Failure {
                    reason: ArchiveError::BodyRender(e.to_string()).to_string(),
                    included: converted,
                };
            }
        };

        let mut documents = vec![body];
        for (index, outcome) in outcomes.iter().enumerate() {
            let ConversionOutcome::Success(artifact) = outcome else {
                continue;
            };
            match merge::load(&artifact.bytes) {
                Ok(loaded) => documents.push(loaded.document),
                Err(reason) => {
                    let name = message
                        .attachments
                        .get(index)
                        .map(|a| a.filename.as_str())
                        .unwrap_or("?");
                    warn!(id = %message.id, file = name, %reason, "dropping unreadable artifact");
                }
            }
        }
        let included = documents.len() - 1;

        let (bytes, page_count) = match merge_documents(documents) {
            Ok(merged) => merged,
            Err(e) => {
                return MergeResult::Failure {
                    reason: e.to_string(),
                    included,
                }
            }
        };

        let path = self.names.claim(&self.output_dir, &archive_file_name(message));
        if let Err(e) = std::fs::write(&path, &bytes) {
            self.names.release(&path);
            let _ = std::fs::remove_file(&path);
            return MergeResult::Failure {
                reason: ArchiveError::io(&path, e).to_string(),
                included,
            };
        }

        debug!(id = %message.id, path = %path.display(), pages = page_count, included, total, "archive written");
        MergeResult::Success {
            path,
            page_count,
            included,
            total,
        }
    }

    /// Reception date as printed on the body page. UTC, like the file name.
    fn received_label(&self, message: &Message) -> String {
        message.received.format(&self.date_format).to_string()
    }

    /// Lay out the leading page(s): metadata, attachment summary, body, footer.
    fn render_body(&self, message: &Message, outcomes: &[ConversionOutcome]) -> Result<Document> {
        let page = self.render.page_size;
        let header_width = proportional_columns(page.dimensions().0, HEADER_SIZE);
        let subject = if message.subject.trim().is_empty() {
            "(no subject)"
        } else {
            message.subject.as_str()
        };

        let mut items = text_items(
            subject,
            Font::Bold,
            TITLE_SIZE,
            proportional_columns(page.dimensions().0, TITLE_SIZE),
        );
        items.push(PageItem::Rule);

        let sender_name = if message.sender.display_name.is_empty() {
            message.sender.label()
        } else {
            message.sender.display_name.clone()
        };
        let received = self.received_label(message);
        for (label, value) in [
            ("From", sender_name.as_str()),
            ("Email", message.sender.address.as_str()),
            ("Subject", subject),
            ("Date", received.as_str()),
        ] {
            items.extend(text_items(
                &format!("{label}: {value}"),
                Font::Regular,
                HEADER_SIZE,
                header_width,
            ));
        }

        if !message.attachments.is_empty() {
            items.push(PageItem::Space(HEADER_SIZE));
            items.push(PageItem::text(
                format!("Attachments ({})", message.attachments.len()),
                Font::Bold,
                HEADER_SIZE,
            ));
            for (index, attachment) in message.attachments.iter().enumerate() {
                let status = match outcomes.get(index) {
                    Some(ConversionOutcome::Success(artifact)) => {
                        format!("included, {} page(s)", artifact.page_count)
                    }
                    Some(ConversionOutcome::Failure(reason)) => format!("not included: {reason}"),
                    None => "not converted".to_string(),
                };
                let line = format!(
                    "{}. {} ({}) - {}",
                    index + 1,
                    attachment.filename,
                    format_size(attachment.size, DECIMAL),
                    status
                );
                items.extend(text_items(&line, Font::Regular, HEADER_SIZE, header_width));
            }
        }

        items.push(PageItem::Rule);
        match message.body.as_text() {
            Some(text) if !text.trim().is_empty() => items.extend(text_items(
                &text,
                Font::Mono,
                self.render.text_font_size,
                self.render.text_wrap_width,
            )),
            _ => items.push(PageItem::text(
                "(empty message body)",
                Font::Regular,
                HEADER_SIZE,
            )),
        }

        items.push(PageItem::Space(HEADER_SIZE));
        items.push(PageItem::Rule);
        items.push(PageItem::text(
            format!(
                "Archived by mailpress on {}",
                Local::now().format(&self.date_format)
            ),
            Font::Regular,
            FOOTER_SIZE,
        ));

        let mut builder = PdfBuilder::new().title(subject);
        for page_items in paginate(items, page) {
            builder.add_text_page(&page_items, page)?;
        }
        builder.into_document(page)
    }
}

/// True if `format` is a strftime pattern chrono can render.
pub fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Rough characters per line for proportional text at `size` on a page `width` wide.
fn proportional_columns(width: f32, size: f32) -> usize {
    let usable = width - 2.0 * MARGIN;
    ((usable / (size * PROPORTIONAL_CHAR_WIDTH)) as usize).max(10)
}
