//! Minimal PDF generation on top of `lopdf`: text pages and full-page images.

use encoding_rs::WINDOWS_1252;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::layout::{Font, PageItem, PageSize, MARGIN};
use crate::error::{ArchiveError, Result};

/// Largest page edge PDF viewers accept (200 inches).
pub const MAX_PAGE_EDGE: f32 = 14_400.0;

/// Incrementally builds a PDF document page by page.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    fonts_id: ObjectId,
    kids: Vec<Object>,
    title: Option<String>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = lopdf::Dictionary::new();
        for font in Font::ALL {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource_name(), font_id);
        }
        let fonts_id = doc.add_object(fonts);

        Self {
            doc,
            pages_id,
            fonts_id,
            kids: Vec::new(),
            title: None,
        }
    }

    /// Set the document title written to the info dictionary.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append one page of laid-out text items, top to bottom.
    pub fn add_text_page(&mut self, items: &[PageItem], page: PageSize) -> Result<()> {
        let (width, height) = page.dimensions();
        let mut operations = Vec::new();
        let mut cursor = height - MARGIN;

        for item in items {
            cursor -= item.height();
            match item {
                PageItem::Text { text, font, size } => {
                    if text.is_empty() {
                        continue;
                    }
                    operations.push(Operation::new("BT", vec![]));
                    operations.push(Operation::new(
                        "Tf",
                        vec![font.resource_name().into(), (*size).into()],
                    ));
                    operations.push(Operation::new("Td", vec![MARGIN.into(), cursor.into()]));
                    operations.push(Operation::new(
                        "Tj",
                        vec![Object::string_literal(to_win_ansi(text))],
                    ));
                    operations.push(Operation::new("ET", vec![]));
                }
                PageItem::Rule => {
                    let y = cursor + PageItem::Rule.height() / 2.0;
                    operations.push(Operation::new("w", vec![0.5f32.into()]));
                    operations.push(Operation::new("m", vec![MARGIN.into(), y.into()]));
                    operations.push(Operation::new("l", vec![(width - MARGIN).into(), y.into()]));
                    operations.push(Operation::new("S", vec![]));
                }
                PageItem::Space(_) => {}
            }
        }

        let resources = dictionary! { "Font" => self.fonts_id };
        self.push_page(operations, resources, width, height)
    }

    /// Append one page showing a JPEG image scaled to the full page.
    ///
    /// `jpeg` must be a baseline RGB JPEG of `px_width` x `px_height` pixels.
    pub fn add_image_page(
        &mut self,
        jpeg: Vec<u8>,
        px_width: u32,
        px_height: u32,
        page_width: f32,
        page_height: f32,
    ) -> Result<()> {
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_width as i64,
                "Height" => px_height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_width.into(),
                    0.into(),
                    0.into(),
                    page_height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ];
        let resources = dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        };
        self.push_page(operations, resources, page_width, page_height)
    }

    fn push_page(
        &mut self,
        operations: Vec<Operation>,
        resources: lopdf::Dictionary,
        width: f32,
        height: f32,
    ) -> Result<()> {
        let content = Content { operations };
        let content_id = self
            .doc
            .add_object(Stream::new(lopdf::Dictionary::new(), content.encode()?));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Serialize the document. A builder with no pages yields one blank page.
    pub fn finish(self, page: PageSize) -> Result<Vec<u8>> {
        let mut doc = self.into_document(page)?;
        save(&mut doc)
    }

    /// Close the page tree and return the in-memory document.
    pub fn into_document(mut self, page: PageSize) -> Result<Document> {
        if self.kids.is_empty() {
            self.add_text_page(&[], page)?;
        }
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => Object::string_literal(concat!("mailpress ", env!("CARGO_PKG_VERSION"))),
        };
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(to_win_ansi(title)));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        Ok(self.doc)
    }
}

/// Serialize a document into memory.
pub fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ArchiveError::PdfWrite(e.to_string()))?;
    Ok(buf)
}

/// Encode text for the built-in fonts' WinAnsi encoding.
///
/// Characters outside Windows-1252 become `?`; control characters become spaces.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(if ch.is_ascii_control() { b' ' } else { ch as u8 });
            continue;
        }
        if ch.is_control() {
            out.push(b' ');
            continue;
        }
        let (bytes, _, had_errors) = WINDOWS_1252.encode(ch.encode_utf8(&mut buf));
        match bytes.as_ref() {
            [byte] if !had_errors => out.push(*byte),
            _ => out.push(b'?'),
        }
    }
    out
}
