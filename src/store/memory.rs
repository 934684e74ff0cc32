//! In-memory mail store.

use std::collections::{BTreeMap, HashSet};

use super::{MailStore, StoreError};
use crate::model::message::{Message, MessageId};

/// A mailbox held entirely in memory.
///
/// Besides serving hosts that already have their messages loaded, it can
/// simulate a misbehaving server: moves, categorization or the whole store
/// can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    folders: BTreeMap<String, Vec<Message>>,
    categories: BTreeMap<MessageId, Vec<String>>,
    failing_moves: HashSet<MessageId>,
    failing_categories: HashSet<MessageId>,
    failing_reads: HashSet<MessageId>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty folder (no-op if it exists).
    pub fn add_folder(&mut self, folder: impl Into<String>) -> &mut Self {
        self.folders.entry(folder.into()).or_default();
        self
    }

    /// Append a message to `folder`, creating the folder if needed.
    pub fn add_message(&mut self, folder: impl Into<String>, message: Message) -> &mut Self {
        self.folders.entry(folder.into()).or_default().push(message);
        self
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&mut self, unavailable: bool) -> &mut Self {
        self.unavailable = unavailable;
        self
    }

    pub fn fail_moves_for(&mut self, id: impl Into<MessageId>) -> &mut Self {
        self.failing_moves.insert(id.into());
        self
    }

    pub fn fail_categories_for(&mut self, id: impl Into<MessageId>) -> &mut Self {
        self.failing_categories.insert(id.into());
        self
    }

    pub fn fail_reads_for(&mut self, id: impl Into<MessageId>) -> &mut Self {
        self.failing_reads.insert(id.into());
        self
    }

    /// Ids of the messages currently in `folder`, in order.
    pub fn message_ids(&self, folder: &str) -> Vec<MessageId> {
        self.folders
            .get(folder)
            .map(|messages| messages.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn categories(&self, id: &MessageId) -> Vec<String> {
        self.categories.get(id).cloned().unwrap_or_default()
    }

    /// Unread flag of a message, wherever it lives now.
    pub fn is_unread(&self, id: &MessageId) -> Option<bool> {
        self.find(id).map(|m| m.unread)
    }

    fn find(&self, id: &MessageId) -> Option<&Message> {
        self.folders
            .values()
            .flat_map(|messages| messages.iter())
            .find(|m| &m.id == id)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.find(id).is_some()
    }
}

impl MailStore for MemoryStore {
    fn list_folders(&self) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        Ok(self.folders.keys().cloned().collect())
    }

    fn has_folder(&self, folder: &str) -> bool {
        !self.unavailable && self.folders.contains_key(folder)
    }

    fn list_messages(&self, folder: &str) -> Result<Vec<Message>, StoreError> {
        self.check_available()?;
        self.folders
            .get(folder)
            .cloned()
            .ok_or_else(|| StoreError::FolderNotFound(folder.to_string()))
    }

    fn move_message(&mut self, id: &MessageId, dest_folder: &str) -> Result<(), StoreError> {
        self.check_available()?;
        if self.failing_moves.contains(id) {
            return Err(StoreError::Rejected(format!("move of {id} refused")));
        }
        if !self.folders.contains_key(dest_folder) {
            return Err(StoreError::FolderNotFound(dest_folder.to_string()));
        }

        let mut moved = None;
        for messages in self.folders.values_mut() {
            if let Some(pos) = messages.iter().position(|m| &m.id == id) {
                moved = Some(messages.remove(pos));
                break;
            }
        }
        let message = moved.ok_or_else(|| StoreError::MessageNotFound(id.to_string()))?;
        self.folders
            .entry(dest_folder.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    fn apply_category(&mut self, id: &MessageId, category: &str) -> Result<(), StoreError> {
        self.check_available()?;
        if self.failing_categories.contains(id) {
            return Err(StoreError::Rejected(format!(
                "category '{category}' refused for {id}"
            )));
        }
        if !self.contains(id) {
            return Err(StoreError::MessageNotFound(id.to_string()));
        }
        let labels = self.categories.entry(id.clone()).or_default();
        if !labels.iter().any(|l| l == category) {
            labels.push(category.to_string());
        }
        Ok(())
    }

    fn mark_read(&mut self, id: &MessageId) -> Result<(), StoreError> {
        self.check_available()?;
        if self.failing_reads.contains(id) {
            return Err(StoreError::Rejected(format!("cannot mark {id} as read")));
        }
        let message = self
            .folders
            .values_mut()
            .flat_map(|messages| messages.iter_mut())
            .find(|m| &m.id == id)
            .ok_or_else(|| StoreError::MessageNotFound(id.to_string()))?;
        message.unread = false;
        Ok(())
    }
}
