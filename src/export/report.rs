//! Run reports: JSON for machines, a fixed-width table for people.

use std::fmt::Write as _;
use std::path::Path;

use humansize::{format_size, BINARY};

use crate::error::{ArchiveError, Result};
use crate::pipeline::{AttachmentOutcome, RecordStatus, RunReport};

/// Serialize a report as pretty-printed JSON.
pub fn to_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the JSON report to `path`, creating parent directories.
pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
    }
    let json = to_json(report)?;
    std::fs::write(path, json).map_err(|e| ArchiveError::io(path, e))
}

/// Human-readable summary: totals, then one row per processed message
/// followed by its attachment failures and mailbox issues.
pub fn summary_table(report: &RunReport) -> String {
    let stats = &report.statistics;
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "  {:<20} {}", "Run", report.state);
    let _ = writeln!(out, "  {:<20} {}", "Folder", report.folder);
    let _ = writeln!(out, "  {:<20} {}", "Output", report.output_dir.display());
    if let Some(error) = &report.error {
        let _ = writeln!(out, "  {:<20} {}", "Error", error);
    }
    let _ = writeln!(
        out,
        "  {:<20} {} of {}",
        "Selected", stats.total, stats.folder_size
    );
    let _ = writeln!(out, "  {:<20} {}", "Archived", stats.succeeded);
    let _ = writeln!(out, "  {:<20} {}", "Failed", stats.failed);
    if stats.cancelled > 0 || stats.remaining() > 0 {
        let _ = writeln!(
            out,
            "  {:<20} {} ({} not started)",
            "Cancelled",
            stats.cancelled,
            stats.remaining()
        );
    }
    let _ = writeln!(out, "  {:<20} {:.2?}", "Elapsed", stats.elapsed);

    if report.records.is_empty() {
        let _ = writeln!(out);
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {:<4} {:<9} {:<40} {:>5} {:>7}  {}",
        "#", "Status", "Subject", "Pages", "Atts", "Output"
    );
    let _ = writeln!(out, "  {}", "-".repeat(98));

    for record in &report.records {
        let status = match &record.status {
            RecordStatus::Success => "ok",
            RecordStatus::Failure(_) => "FAILED",
            RecordStatus::Cancelled => "cancelled",
        };
        let subject: String = record.subject.chars().take(39).collect();
        let output = record
            .output
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<4} {:<9} {:<40} {:>5} {:>7}  {}",
            record.index,
            status,
            subject,
            record.page_count,
            format!("{}/{}", record.included, record.attachments.len()),
            output
        );

        if let RecordStatus::Failure(reason) = &record.status {
            let _ = writeln!(out, "         {reason}");
        }
        for attachment in &record.attachments {
            if let AttachmentOutcome::Failed { reason, .. } = &attachment.outcome {
                let _ = writeln!(
                    out,
                    "         {} ({}): {reason}",
                    attachment.filename,
                    format_size(attachment.size, BINARY)
                );
            }
        }
        for issue in &record.mailbox_issues {
            let _ = writeln!(out, "         {issue}");
        }
    }
    let _ = writeln!(out);
    out
}
