//! Per-message records, run statistics and the final run report.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::convert::{CapabilityClass, ConversionOutcome};
use crate::error::ConversionFailure;
use crate::model::attachment::Attachment;
use crate::model::message::{Message, MessageId};

/// Final status of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Failure(String),
    /// Cancellation was observed before the message committed to an outcome.
    Cancelled,
}

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum AttachmentOutcome {
    Converted { pages: usize },
    Failed { code: String, reason: ConversionFailure },
    /// Not attempted because the run was cancelled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRecord {
    pub filename: String,
    pub size: u64,
    pub class: Option<CapabilityClass>,
    pub outcome: AttachmentOutcome,
}

impl AttachmentRecord {
    pub fn new(attachment: &Attachment, outcome: &ConversionOutcome) -> Self {
        let outcome = match outcome {
            ConversionOutcome::Success(artifact) => AttachmentOutcome::Converted {
                pages: artifact.page_count,
            },
            ConversionOutcome::Failure(reason) => AttachmentOutcome::Failed {
                code: reason.code().to_string(),
                reason: reason.clone(),
            },
        };
        Self {
            filename: attachment.filename.clone(),
            size: attachment.size,
            class: CapabilityClass::for_extension(&attachment.extension),
            outcome,
        }
    }

    pub fn skipped(attachment: &Attachment) -> Self {
        Self {
            filename: attachment.filename.clone(),
            size: attachment.size,
            class: CapabilityClass::for_extension(&attachment.extension),
            outcome: AttachmentOutcome::Skipped,
        }
    }

    pub fn failure(&self) -> Option<&ConversionFailure> {
        match &self.outcome {
            AttachmentOutcome::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A mailbox update that failed after the archive was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MailboxIssue {
    RelocationFailed { folder: String, reason: String },
    CategorizationFailed { category: String, reason: String },
    MarkReadFailed { reason: String },
    /// The mailbox updates stopped part way through.
    Interrupted { reason: String },
}

impl std::fmt::Display for MailboxIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RelocationFailed { folder, reason } => {
                write!(f, "not moved to '{folder}': {reason}")
            }
            Self::CategorizationFailed { category, reason } => {
                write!(f, "category '{category}' not applied: {reason}")
            }
            Self::MarkReadFailed { reason } => write!(f, "not marked as read: {reason}"),
            Self::Interrupted { reason } => write!(f, "mailbox updates interrupted: {reason}"),
        }
    }
}

/// Outcome of one message. Filled in while the message is processed and
/// never changed once it has been reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingRecord {
    /// 1-based position among the selected messages.
    pub index: usize,
    pub message_id: MessageId,
    pub subject: String,
    #[serde(flatten)]
    pub status: RecordStatus,
    pub attachments: Vec<AttachmentRecord>,
    pub output: Option<PathBuf>,
    pub page_count: usize,
    /// Attachments included in the output.
    pub included: usize,
    pub mailbox_issues: Vec<MailboxIssue>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ProcessingRecord {
    /// Empty record for a message about to be processed. Its status stays
    /// `Cancelled` until an outcome is settled.
    pub fn pending(index: usize, message: &Message) -> Self {
        Self {
            index,
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            status: RecordStatus::Cancelled,
            attachments: Vec::with_capacity(message.attachments.len()),
            output: None,
            page_count: 0,
            included: 0,
            mailbox_issues: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    pub fn failed_attachments(&self) -> impl Iterator<Item = &AttachmentRecord> {
        self.attachments.iter().filter(|a| a.failure().is_some())
    }
}

/// Running totals of a run.
///
/// `processed == succeeded + failed + cancelled` holds at every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Messages in the source folder.
    pub folder_size: usize,
    /// Messages selected by the filter.
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// 1-based index of the message being (or last) processed; 0 before the first.
    pub current_index: usize,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunStatistics {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            folder_size: 0,
            total: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            current_index: 0,
            started_at,
            elapsed: Duration::ZERO,
        }
    }

    /// Count a terminal record.
    pub fn record(&mut self, record: &ProcessingRecord) {
        self.processed += 1;
        match record.status {
            RecordStatus::Success => self.succeeded += 1,
            RecordStatus::Failure(_) => self.failed += 1,
            RecordStatus::Cancelled => self.cancelled += 1,
        }
    }

    /// Share of selected messages processed so far, 0–100.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 * 100.0 / self.total as f64
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }
}

/// Lifecycle of a run: `Idle → Running → {Completed, Cancelled, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Cancelled => 3,
            Self::Failed => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            4 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    /// Why the run failed, for [`RunState::Failed`].
    pub error: Option<String>,
    pub folder: String,
    pub output_dir: PathBuf,
    pub statistics: RunStatistics,
    pub records: Vec<ProcessingRecord>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProcessingRecord> {
        self.records.iter().filter(|r| r.is_success())
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
}
