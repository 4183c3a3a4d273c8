use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use super::{PdfError, PdfResult, write_document};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

/// Concatenates `inputs` in order into a single document at `output`.
///
/// Returns the page count of the written document.
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> PdfResult<usize> {
    if inputs.is_empty() {
        return Err(PdfError::NoInputs);
    }

    let mut documents = inputs
        .iter()
        .map(|path| load_pdf(path))
        .collect::<PdfResult<Vec<_>>>()?;

    let mut merged = documents.remove(0);

    if !documents.is_empty() {
        let pages_id = merged.catalog()?.get(b"Pages")?.as_reference()?;
        let mut max_id = merged.max_id;

        for (idx, mut doc) in documents.into_iter().enumerate() {
            // Renumber the incoming document so its ids cannot collide.
            doc.renumber_objects_with(max_id + 1);
            max_id = doc.max_id;

            let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
            for page_id in &page_ids {
                inline_inherited_attributes(&mut doc, *page_id)?;
                doc.get_object_mut(*page_id)?
                    .as_dict_mut()?
                    .set("Parent", Object::Reference(pages_id));
            }

            debug!(
                input = %inputs[idx + 1].display(),
                pages = page_ids.len(),
                "appending document"
            );

            merged.objects.extend(doc.objects);
            append_to_page_tree(&mut merged, pages_id, &page_ids)?;
        }

        merged.max_id = max_id;
        merged.prune_objects();
        merged.renumber_objects();
    }

    merged.compress();
    write_document(&mut merged, output)?;

    Ok(merged.get_pages().len())
}

fn load_pdf(path: &Path) -> PdfResult<Document> {
    Document::load(path).map_err(|err| PdfError::FailedToLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Copies attributes the page inherits from intermediate tree nodes onto the
/// page itself, so it renders the same once re-parented.
fn inline_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> PdfResult<()> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();

    {
        let page = doc.get_object(page_id)?.as_dict()?;
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if depth >= MAX_TREE_DEPTH {
                break;
            }
            let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
                break;
            };

            for key in INHERITABLE_KEYS {
                if page.has(key) || inherited.iter().any(|(existing, _)| *existing == key) {
                    continue;
                }
                if let Ok(value) = node.get(key) {
                    inherited.push((key, value.clone()));
                }
            }

            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }

    Ok(())
}

fn append_to_page_tree(
    merged: &mut Document,
    pages_id: ObjectId,
    page_ids: &[ObjectId],
) -> PdfResult<()> {
    let pages = merged.get_object_mut(pages_id)?.as_dict_mut()?;

    let kids = pages.get_mut(b"Kids")?.as_array_mut()?;
    kids.extend(page_ids.iter().map(|id| Object::Reference(*id)));

    let count = pages.get(b"Count")?.as_i64()?;
    pages.set("Count", Object::Integer(count + page_ids.len() as i64));

    Ok(())
}
