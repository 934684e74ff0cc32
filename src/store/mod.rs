//! Mail store access.
//!
//! The pipeline only talks to a mailbox through [`MailStore`]. Two
//! implementations ship with the crate: [`DirectoryStore`] over folders of
//! `.eml` files and [`MemoryStore`] for embedding and tests.

pub mod directory;
pub mod memory;

use std::path::PathBuf;

use thiserror::Error;

use crate::model::message::{Message, MessageId};

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// Errors reported by a mail store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store cannot be used at all (not found, not connected, offline).
    #[error("mail store unavailable: {0}")]
    Unavailable(String),

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// The store understood the request but refused it.
    #[error("operation rejected: {0}")]
    Rejected(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A mailbox the pipeline reads from and files messages into.
///
/// Implementations need not be thread-safe: the pipeline creates its store
/// on the background thread and uses it from there only.
pub trait MailStore {
    /// All folder names, sorted. Nested folders use `/` as separator.
    fn list_folders(&self) -> Result<Vec<String>, StoreError>;

    fn has_folder(&self, folder: &str) -> bool;

    /// Snapshot of the messages in `folder`, in the folder's natural order.
    fn list_messages(&self, folder: &str) -> Result<Vec<Message>, StoreError>;

    /// Move a message into `dest_folder`. The id is not valid afterwards.
    fn move_message(&mut self, id: &MessageId, dest_folder: &str) -> Result<(), StoreError>;

    /// Attach a category label to a message. Applying a label twice is a no-op.
    fn apply_category(&mut self, id: &MessageId, category: &str) -> Result<(), StoreError>;

    /// Clear the message's unread flag. Idempotent.
    fn mark_read(&mut self, id: &MessageId) -> Result<(), StoreError>;
}
