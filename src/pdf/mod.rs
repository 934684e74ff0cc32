//! PDF generation, validation and merging.

pub mod layout;
pub mod merge;
pub mod writer;

pub use layout::{Font, PageItem, PageSize};
pub use writer::PdfBuilder;
