//! Plain text: paginated monospace pages headed by the file name.

use encoding_rs::{Encoding, WINDOWS_1252};

use super::{Artifact, RenderOptions};
use crate::error::ConversionFailure;
use crate::model::attachment::Attachment;
use crate::pdf::layout::{paginate, text_items, Font, PageItem};
use crate::pdf::writer::PdfBuilder;

/// Render a text attachment, wrapped at the configured width.
pub fn convert(attachment: &Attachment, options: &RenderOptions) -> Result<Artifact, ConversionFailure> {
    let text = decode_text(&attachment.content);

    let mut items = vec![
        PageItem::text(&attachment.filename, Font::Bold, options.text_font_size + 2.0),
        PageItem::Rule,
    ];
    items.extend(text_items(
        &text,
        Font::Mono,
        options.text_font_size,
        options.text_wrap_width,
    ));

    let pages = paginate(items, options.page_size);
    let mut builder = PdfBuilder::new().title(attachment.filename.clone());
    for page in &pages {
        builder
            .add_text_page(page, options.page_size)
            .map_err(|e| ConversionFailure::RenderFailed(e.to_string()))?;
    }
    let page_count = builder.page_count();
    let bytes = builder
        .finish(options.page_size)
        .map_err(|e| ConversionFailure::RenderFailed(e.to_string()))?;

    Ok(Artifact { bytes, page_count })
}

/// Decode text bytes: BOM first, then UTF-8, then Windows-1252.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        assert_eq!(decode_text(b"caf\xe9"), "café");
    }

    #[test]
    fn test_decode_utf16_bom() {
        assert_eq!(decode_text(b"\xFF\xFEh\x00i\x00"), "hi");
    }

    #[test]
    fn test_long_text_paginates() {
        let body: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let att = Attachment::new("log.txt", "text/plain", body.into_bytes());
        let artifact = convert(&att, &RenderOptions::default()).unwrap();
        assert!(artifact.page_count >= 2);
        let doc = lopdf::Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), artifact.page_count);
    }

    #[test]
    fn test_empty_text_still_renders() {
        let att = Attachment::new("empty.txt", "text/plain", Vec::new());
        let artifact = convert(&att, &RenderOptions::default()).unwrap();
        assert_eq!(artifact.page_count, 1);
    }
}
