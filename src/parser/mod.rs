//! Message parsing: `.eml` decoding via `mail-parser` and HTML flattening.

pub mod eml;
pub mod html;
