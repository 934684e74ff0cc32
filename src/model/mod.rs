//! Core data model types for messages, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod message;

pub use address::EmailAddress;
pub use attachment::Attachment;
pub use message::{Message, MessageBody, MessageId};
