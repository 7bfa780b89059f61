//! Concatenating documents
//!
//! Every input is renumbered into a disjoint object id range, its page tree
//! nodes are dropped and its pages are re-parented under one fresh `Pages`
//! node, in input order. Attributes a page inherited from its old tree
//! (resources, boxes, rotation) are copied onto the page first so nothing
//! is lost with the old nodes.

use crate::io::{load_all, save_pdf};
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// Page attributes that may be inherited from ancestor `Pages` nodes
const INHERITABLE_KEYS: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page tree depth when resolving inherited attributes
const MAX_TREE_DEPTH: usize = 64;

/// Merge PDFs from disk into `output`, returning the merged page count.
pub async fn merge_pdfs(inputs: &[impl AsRef<Path>], output: impl AsRef<Path>) -> Result<usize> {
    if inputs.is_empty() {
        return Err(PdfOpsError::NoInput);
    }

    let documents = load_all(inputs).await?;
    let merged = tokio::task::spawn_blocking(move || merge_documents(documents)).await??;
    let page_count = merged.get_pages().len();
    save_pdf(merged, output).await?;

    log::debug!("Merged {} inputs into {} pages", inputs.len(), page_count);
    Ok(page_count)
}

/// Merge documents into one, pages in input order.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    if documents.is_empty() {
        return Err(PdfOpsError::NoInput);
    }

    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut next_id = 1;

    for mut doc in documents {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &page_id in &pages {
            flatten_inherited_attributes(&mut doc, page_id)?;
        }
        page_ids.extend(pages);

        for (id, object) in doc.objects {
            if !is_tree_node(&object) {
                merged.objects.insert(id, object);
            }
        }
    }

    if page_ids.is_empty() {
        return Err(PdfOpsError::NoPages);
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();

    for &page_id in &page_ids {
        merged
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Parent", Object::Reference(pages_id));
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(page_ids.len() as i64)),
    ]);
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = merged.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    merged.trailer.set("Root", catalog_id);

    // Outlines and other catalog-only objects of the inputs are now unreachable
    merged.prune_objects();
    merged.renumber_objects();

    Ok(merged)
}

/// Whether an object is a `Catalog` or a `Pages` node
fn is_tree_node(object: &Object) -> bool {
    matches!(type_name(object), Some(b"Catalog") | Some(b"Pages"))
}

fn type_name(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

/// Copy inheritable attributes from ancestor nodes onto the page itself.
fn flatten_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let inherited: Vec<(&[u8], Object)> = {
        let page = doc.get_dictionary(page_id)?;
        INHERITABLE_KEYS
            .iter()
            .filter(|&&key| !page.has(key))
            .filter_map(|&key| find_inherited(doc, page, key).map(|value| (key, value)))
            .collect()
    };

    if inherited.is_empty() {
        return Ok(());
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key.to_vec(), value);
    }
    Ok(())
}

fn find_inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}
