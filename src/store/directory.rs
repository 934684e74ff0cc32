//! Mail store over a directory tree of `.eml` files.
//!
//! ```text
//! root/
//!   Inbox/
//!     0001.eml
//!     0001.eml.categories   <- one category label per line
//!     0001.eml.seen         <- present once the message has been read
//!   Archive/
//!     2024/
//! ```
//!
//! Folders are directories (nested ones are addressed as `Archive/2024`),
//! messages are `.eml` files listed in file-name order. A message id is its
//! path relative to the root with `/` separators. Messages without a `.seen`
//! marker are unread.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{MailStore, StoreError};
use crate::export::naming::unique_path;
use crate::model::message::{Message, MessageId};
use crate::parser::eml::parse_message;

/// Suffix of the sidecar file holding a message's categories.
const CATEGORIES_SUFFIX: &str = ".categories";

/// Suffix of the empty marker file flagging a message as read.
const SEEN_SUFFIX: &str = ".seen";

/// Sidecars that travel with a message when it is moved.
const SIDECAR_SUFFIXES: &[&str] = &[CATEGORIES_SUFFIX, SEEN_SUFFIX];

/// A mailbox stored as folders of `.eml` files.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open an existing directory as a mail store.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Categories recorded for a message, in the order they were applied.
    pub fn categories(&self, id: &MessageId) -> Result<Vec<String>, StoreError> {
        let path = self.message_path(id)?;
        read_categories(&sidecar_path(&path, CATEGORIES_SUFFIX))
    }

    /// True once the message has been marked as read.
    pub fn is_read(&self, id: &MessageId) -> Result<bool, StoreError> {
        let path = self.message_path(id)?;
        Ok(sidecar_path(&path, SEEN_SUFFIX).exists())
    }

    /// Resolve a `/`-separated relative name under the root, refusing
    /// anything that could escape it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut any = false;
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            let mut components = Path::new(part).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(c)), None) => path.push(c),
                _ => return None,
            }
            any = true;
        }
        any.then_some(path)
    }

    fn folder_path(&self, folder: &str) -> Result<PathBuf, StoreError> {
        self.resolve(folder)
            .filter(|p| p.is_dir())
            .ok_or_else(|| StoreError::FolderNotFound(folder.to_string()))
    }

    fn message_path(&self, id: &MessageId) -> Result<PathBuf, StoreError> {
        self.resolve(id.as_str())
            .filter(|p| p.is_file())
            .ok_or_else(|| StoreError::MessageNotFound(id.to_string()))
    }

    fn collect_folders(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let folder = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            self.collect_folders(&entry.path(), &folder, out)?;
            out.push(folder);
        }
        Ok(())
    }
}

impl MailStore for DirectoryStore {
    fn list_folders(&self) -> Result<Vec<String>, StoreError> {
        let mut folders = Vec::new();
        self.collect_folders(&self.root, "", &mut folders)?;
        folders.sort();
        Ok(folders)
    }

    fn has_folder(&self, folder: &str) -> bool {
        self.folder_path(folder).is_ok()
    }

    fn list_messages(&self, folder: &str) -> Result<Vec<Message>, StoreError> {
        let dir = self.folder_path(folder)?;
        let mut files: Vec<(String, PathBuf)> = fs::read_dir(&dir)
            .map_err(|e| StoreError::io(&dir, e))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let is_eml = Path::new(&name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
                (is_eml && entry.path().is_file()).then(|| (name, entry.path()))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let folder = folder.trim_matches('/');
        let mut messages = Vec::with_capacity(files.len());
        for (name, path) in files {
            let raw = match fs::read(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable message");
                    continue;
                }
            };
            let fallback_date = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or(DateTime::UNIX_EPOCH);
            let id = MessageId::new(format!("{folder}/{name}"));
            let unread = !sidecar_path(&path, SEEN_SUFFIX).exists();
            messages.push(parse_message(&raw, id, fallback_date).with_unread(unread));
        }
        debug!(folder, count = messages.len(), "listed folder");
        Ok(messages)
    }

    fn move_message(&mut self, id: &MessageId, dest_folder: &str) -> Result<(), StoreError> {
        let source = self.message_path(id)?;
        let dest_dir = self.folder_path(dest_folder)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| StoreError::MessageNotFound(id.to_string()))?;
        let target = unique_path(&dest_dir.join(file_name));

        fs::rename(&source, &target).map_err(|e| StoreError::io(&source, e))?;

        for suffix in SIDECAR_SUFFIXES {
            let sidecar = sidecar_path(&source, suffix);
            if !sidecar.exists() {
                continue;
            }
            if let Err(e) = fs::rename(&sidecar, sidecar_path(&target, suffix)) {
                warn!(path = %sidecar.display(), error = %e, "sidecar left behind");
            }
        }
        debug!(id = %id, to = %target.display(), "moved message");
        Ok(())
    }

    fn apply_category(&mut self, id: &MessageId, category: &str) -> Result<(), StoreError> {
        let category = category.trim();
        if category.is_empty() || category.contains('\n') {
            return Err(StoreError::Rejected(format!("invalid category '{category}'")));
        }
        let path = self.message_path(id)?;
        let sidecar = sidecar_path(&path, CATEGORIES_SUFFIX);
        let mut categories = read_categories(&sidecar)?;
        if categories.iter().any(|c| c == category) {
            return Ok(());
        }
        categories.push(category.to_string());
        let mut content = categories.join("\n");
        content.push('\n');
        fs::write(&sidecar, content).map_err(|e| StoreError::io(&sidecar, e))
    }

    fn mark_read(&mut self, id: &MessageId) -> Result<(), StoreError> {
        let path = self.message_path(id)?;
        let marker = sidecar_path(&path, SEEN_SUFFIX);
        if marker.exists() {
            return Ok(());
        }
        fs::write(&marker, b"").map_err(|e| StoreError::io(&marker, e))
    }
}

fn sidecar_path(message: &Path, suffix: &str) -> PathBuf {
    let mut name = message.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn read_categories(sidecar: &Path) -> Result<Vec<String>, StoreError> {
    match fs::read_to_string(sidecar) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StoreError::io(sidecar, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_refuses_escape() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        assert!(store.resolve("../etc").is_none());
        assert!(store.resolve("a/../../b").is_none());
        assert!(store.resolve("").is_none());
        assert_eq!(store.resolve("a//b/"), Some(dir.path().join("a").join("b")));
    }

    #[test]
    fn test_open_missing_root() {
        assert!(matches!(
            DirectoryStore::open("/nonexistent/mailpress-root"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/m/Inbox/1.eml"), CATEGORIES_SUFFIX),
            PathBuf::from("/m/Inbox/1.eml.categories")
        );
        assert_eq!(
            sidecar_path(Path::new("/m/Inbox/1.eml"), SEEN_SUFFIX),
            PathBuf::from("/m/Inbox/1.eml.seen")
        );
    }
}
