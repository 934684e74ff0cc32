//! Core message types.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::Attachment;
use crate::parser::html::html_to_text;

/// Opaque message identifier, unique and stable within a run.
///
/// The mail store decides what it contains (a relative path for the
/// directory store, any string for the in-memory store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Text content of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    /// Plain-text body (from the `text/plain` part).
    pub text: Option<String>,

    /// HTML body (from the `text/html` part, if present).
    pub html: Option<String>,
}

impl MessageBody {
    /// Body as plain text: the text part, or the HTML part flattened.
    pub fn as_text(&self) -> Option<String> {
        match (&self.text, &self.html) {
            (Some(text), _) if !text.trim().is_empty() => Some(text.clone()),
            (_, Some(html)) => Some(html_to_text(html)),
            (Some(text), None) => Some(text.clone()),
            (None, None) => None,
        }
    }
}

/// Immutable snapshot of a mailbox message, taken when its folder is listed.
///
/// The pipeline never mutates a message. Moving and labelling go through
/// the [`MailStore`](crate::store::MailStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,

    /// Decoded subject line (empty if missing).
    pub subject: String,

    pub sender: EmailAddress,

    /// Reception date. Falls back to the file time, then to Unix epoch.
    pub received: DateTime<Utc>,

    pub body: MessageBody,

    /// Attachments in the order they appear in the message.
    pub attachments: Vec<Attachment>,

    /// Not yet marked as read in the store.
    pub unread: bool,
}

impl Message {
    /// Minimal message without body or attachments.
    pub fn new(
        id: impl Into<MessageId>,
        subject: impl Into<String>,
        sender: EmailAddress,
        received: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            sender,
            received,
            body: MessageBody::default(),
            attachments: Vec::new(),
            unread: true,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body.text = Some(text.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.body.html = Some(html.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_unread(mut self, unread: bool) -> Self {
        self.unread = unread;
        self
    }
}
