//! Attachment snapshot.
//!
//! Unlike an index entry, an attachment here carries its decoded content:
//! the pipeline needs the bytes to convert them and the message is an
//! immutable snapshot taken when the folder is listed.

/// A decoded attachment of a [`Message`](super::message::Message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename as given by the sender. Generated if missing from the headers.
    pub filename: String,

    /// Lower-cased extension without the dot (`"pdf"`, `"docx"`), empty if none.
    pub extension: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded content.
    pub content: Vec<u8>,

    /// Size of `content` in bytes.
    pub size: u64,
}

impl Attachment {
    /// Build an attachment, deriving `extension` and `size`.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        let filename = filename.into();
        let extension = extension_of(&filename);
        let size = content.len() as u64;
        Self {
            filename,
            extension,
            content_type: content_type.into(),
            content,
            size,
        }
    }
}

/// Lower-cased extension of `filename`, or an empty string.
///
/// Dot-files such as `.profile` have no extension.
pub fn extension_of(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(pos) => name[pos + 1..].trim().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lowercased() {
        assert_eq!(extension_of("Invoice.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".profile"), "");
        assert_eq!(extension_of("dir.d/file"), "");
    }

    #[test]
    fn test_new_sets_size() {
        let att = Attachment::new("scan.JPG", "image/jpeg", vec![1, 2, 3]);
        assert_eq!(att.extension, "jpg");
        assert_eq!(att.size, 3);
    }
}
