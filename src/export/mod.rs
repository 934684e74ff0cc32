//! Output side of a run: archive PDFs, their file names and run reports.

pub mod archive;
pub mod naming;
pub mod report;
