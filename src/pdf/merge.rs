//! Loading and concatenating PDF documents.

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::writer::save;
use crate::error::{ArchiveError, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in broken files.
const MAX_TREE_DEPTH: usize = 64;

/// A parsed PDF together with its page count.
pub struct LoadedPdf {
    pub document: Document,
    pub page_count: usize,
}

/// Parse `bytes` as a PDF and check that it has at least one page.
pub fn load(bytes: &[u8]) -> std::result::Result<LoadedPdf, String> {
    if !has_pdf_header(bytes) {
        return Err("missing %PDF header".to_string());
    }
    let document = Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let page_count = document.get_pages().len();
    if page_count == 0 {
        return Err("document has no pages".to_string());
    }
    Ok(LoadedPdf {
        document,
        page_count,
    })
}

/// The header may be preceded by junk; readers scan the first kilobyte.
fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// Concatenate documents in order into a single PDF.
///
/// Returns the serialized bytes and the total page count.
pub fn merge_documents(documents: Vec<Document>) -> Result<(Vec<u8>, usize)> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();

    for mut doc in documents {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &page_id in &pages {
            flatten_inherited(&mut doc, page_id);
        }
        debug!(pages = pages.len(), "appending document");
        page_ids.extend(pages);

        for (id, object) in doc.objects {
            if !is_structural(&object) {
                merged.objects.insert(id, object);
            }
        }
    }

    if page_ids.is_empty() {
        return Err(ArchiveError::PdfWrite("no pages to merge".to_string()));
    }

    merged.max_id = merged.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    let pages_id = merged.new_object_id();
    for &page_id in &page_ids {
        if let Ok(page) = merged.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", pages_id);
        }
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    let page_count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    Ok((save(&mut merged)?, page_count))
}

/// Copy inherited attributes onto the page so it survives losing its parents.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) {
    let mut inherited = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return;
    };
    for key in INHERITABLE {
        if page.has(key) {
            continue;
        }
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;
        while let Some(parent_id) = parent {
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                break;
            }
            let Ok(node) = doc.get_dictionary(parent_id) else {
                break;
            };
            if let Ok(value) = node.get(key) {
                inherited.push((key, value.clone()));
                break;
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }
    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}

/// Document-level objects rebuilt by the merge (catalog, page tree, outlines,
/// cross-reference and object streams).
fn is_structural(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Catalog" | b"Pages" | b"Outlines" | b"Outline" | b"XRef" | b"ObjStm")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::layout::{Font, PageItem, PageSize};
    use crate::pdf::writer::PdfBuilder;

    fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut builder = PdfBuilder::new();
        for i in 0..pages {
            let items = vec![PageItem::text(format!("page {i}"), Font::Regular, 12.0)];
            builder.add_text_page(&items, PageSize::A4).unwrap();
        }
        builder.finish(PageSize::A4).unwrap()
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(load(b"definitely not a pdf").is_err());
        assert!(load(b"%PDF-1.4\ntruncated").is_err());
    }

    #[test]
    fn test_load_counts_pages() {
        let loaded = load(&sample_pdf(3)).unwrap();
        assert_eq!(loaded.page_count, 3);
    }

    #[test]
    fn test_merge_concatenates_pages() {
        let docs = vec![
            load(&sample_pdf(1)).unwrap().document,
            load(&sample_pdf(2)).unwrap().document,
            load(&sample_pdf(3)).unwrap().document,
        ];
        let (bytes, count) = merge_documents(docs).unwrap();
        assert_eq!(count, 6);
        assert_eq!(load(&bytes).unwrap().page_count, 6);
    }

    #[test]
    fn test_merge_nothing_fails() {
        assert!(merge_documents(Vec::new()).is_err());
    }

    #[test]
    fn test_inherited_media_box_is_copied() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
            }),
        );
        flatten_inherited(&mut doc, page_id);
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(!page.has(b"Resources"));
    }
}
