//! `mailpress`: batch archiving of mail messages into self-contained PDFs.
//!
//! A run selects the messages of one mailbox folder by subject keyword and
//! date range, converts every attachment to PDF, merges a rendered body
//! page with the converted attachments into one file per message, then
//! labels and relocates the message in the mail store.

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod pdf;
pub mod pipeline;
pub mod store;
