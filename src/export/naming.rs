//! Output file naming: sanitized, deterministic, collision-free.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::message::Message;

/// Longest file name we generate, in characters (extension included).
const MAX_NAME_CHARS: usize = 150;

/// Device names Windows refuses as file stems, whatever the extension.
const RESERVED_STEMS: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Sanitize a string for use in filenames.
///
/// Keeps letters, digits, `-`, `.` and `@`; everything else becomes `_`.
/// Runs of `_` collapse, leading and trailing `_`/`.` are dropped and the
/// result is truncated to `max_len` characters.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let mut sanitized = String::with_capacity(s.len().min(max_len));
    let mut last_was_sep = false;
    for c in s.chars() {
        let c = if c.is_alphanumeric() || c == '-' || c == '.' || c == '@' {
            c
        } else {
            '_'
        };
        if c == '_' {
            if last_was_sep {
                continue;
            }
            last_was_sep = true;
        } else {
            last_was_sep = false;
        }
        sanitized.push(c);
    }

    let trimmed: String = sanitized
        .trim_matches(['_', '.'])
        .chars()
        .take(max_len)
        .collect();
    let trimmed = trimmed.trim_end_matches(['_', '.']);

    if trimmed.is_empty() {
        "unknown".to_string()
    } else if RESERVED_STEMS.contains(&trimmed.to_lowercase().as_str()) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Base archive name for a message: `{date}_{sender}_{subject}.pdf`, dated in UTC.
pub fn archive_file_name(message: &Message) -> String {
    let date = message.received.format("%Y-%m-%d").to_string();
    let sender = sanitize_filename_part(&message.sender.label(), 40);
    let subject = if message.subject.trim().is_empty() {
        "no_subject".to_string()
    } else {
        sanitize_filename_part(&message.subject, 80)
    };

    let stem: String = format!("{date}_{sender}_{subject}")
        .chars()
        .take(MAX_NAME_CHARS - 4)
        .collect();
    format!("{}.pdf", stem.trim_end_matches(['_', '.']))
}

/// Hands out output paths that are unique within a run and on disk.
///
/// Names are compared case-insensitively, so the run is also safe on
/// case-insensitive filesystems.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a path for `file_name` in `dir`, appending `_1`, `_2`, … on collision.
    pub fn claim(&mut self, dir: &Path, file_name: &str) -> PathBuf {
        let (stem, ext) = split_extension(file_name);
        let mut candidate = file_name.to_string();
        let mut counter = 1;
        while self.used.contains(&candidate.to_lowercase()) || dir.join(&candidate).exists() {
            candidate = with_suffix(stem, ext, counter);
            counter += 1;
        }
        self.used.insert(candidate.to_lowercase());
        dir.join(candidate)
    }

    /// Forget a claimed path (its file was never written).
    pub fn release(&mut self, path: &Path) {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            self.used.remove(&name.to_lowercase());
        }
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("file");
    let (stem, ext) = split_extension(name);
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut counter = 1;
    loop {
        let candidate = parent.join(with_suffix(stem, ext, counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos + 1..]),
        _ => (file_name, ""),
    }
}

fn with_suffix(stem: &str, ext: &str, counter: usize) -> String {
    if ext.is_empty() {
        format!("{stem}_{counter}")
    } else {
        format!("{stem}_{counter}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::EmailAddress;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello world", 20), "hello_world");
        assert_eq!(
            sanitize_filename_part("user@example.com", 30),
            "user@example.com"
        );
        assert_eq!(sanitize_filename_part("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
    }

    #[test]
    fn test_sanitize_collapses_and_trims() {
        assert_eq!(sanitize_filename_part("Re: <Invoice>  #42?", 40), "Re_Invoice_42");
        assert_eq!(sanitize_filename_part("...", 10), "unknown");
        assert_eq!(sanitize_filename_part("???", 10), "unknown");
    }

    #[test]
    fn test_sanitize_truncates_by_chars() {
        assert_eq!(sanitize_filename_part("ééééé", 3), "ééé");
    }

    #[test]
    fn test_sanitize_reserved_names() {
        assert_eq!(sanitize_filename_part("CON", 10), "_CON");
        assert_eq!(sanitize_filename_part("lpt1", 10), "_lpt1");
    }

    #[test]
    fn test_archive_file_name() {
        let msg = Message::new(
            "1",
            "Invoice: March/2024",
            EmailAddress::new("Acme Billing", "billing@acme.com"),
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        );
        assert_eq!(
            archive_file_name(&msg),
            "2024-03-05_Acme_Billing_Invoice_March_2024.pdf"
        );
    }

    #[test]
    fn test_archive_file_name_without_subject() {
        let msg = Message::new(
            "1",
            "  ",
            EmailAddress::new("", "billing@acme.com"),
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        );
        assert_eq!(archive_file_name(&msg), "2024-03-05_Acme_no_subject.pdf");
    }

    #[test]
    fn test_registry_disambiguates_within_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = NameRegistry::new();
        let a = names.claim(dir.path(), "report.pdf");
        let b = names.claim(dir.path(), "REPORT.pdf");
        let c = names.claim(dir.path(), "report.pdf");
        assert_eq!(a.file_name().unwrap(), "report.pdf");
        assert_eq!(b.file_name().unwrap(), "REPORT_1.pdf");
        assert_eq!(c.file_name().unwrap(), "report_2.pdf");
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_registry_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"old").unwrap();
        let mut names = NameRegistry::new();
        let path = names.claim(dir.path(), "report.pdf");
        assert_eq!(path.file_name().unwrap(), "report_1.pdf");
    }

    #[test]
    fn test_release_frees_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = NameRegistry::new();
        let path = names.claim(dir.path(), "a.pdf");
        names.release(&path);
        assert!(names.is_empty());
        assert_eq!(names.claim(dir.path(), "a.pdf"), path);
    }

    #[test]
    fn test_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.eml");
        assert_eq!(unique_path(&path), path);
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(unique_path(&path), dir.path().join("m_1.eml"));
    }
}
