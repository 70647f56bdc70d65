//! PDF page engine: split and merge via lopdf.
//!
//! ## Split: construction by whitelist
//!
//! Rather than copying wanted pages into a fresh document (which requires
//! chasing every shared resource through the object graph), split clones
//! the source and deletes the pages *not* selected, then prunes orphaned
//! objects. Pages keep their source order, which is exactly the selection's
//! ascending order.
//!
//! ## Merge: renumber and rebuild
//!
//! Each input's objects are renumbered into a disjoint id range, all
//! non-page-tree objects are pooled, and a new Pages/Catalog pair is built
//! whose Kids list the pages in input order. Attributes a page inherits
//! from its source Pages node (Resources, MediaBox, CropBox, Rotate) are
//! folded into the page dict before its tree is dropped. The result is
//! written to a temp path and atomically renamed so a failed merge never
//! leaves a partial output in place.
//!
//! All lopdf work is CPU-bound and runs inside `spawn_blocking`.

use crate::error::ConvertError;
use crate::format::{Document, DocumentFormat};
use crate::outcome::DocumentMetadata;
use crate::pages::PageSelection;
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Extract the selected pages into a new single PDF inside `output_dir`.
///
/// The output filename is generated (`split_<epoch-ms>.pdf`) and guaranteed
/// not to collide with an existing file.
pub async fn split(
    document: &Document,
    selection: &PageSelection,
    output_dir: &Path,
) -> Result<Document, ConvertError> {
    if selection.is_empty() {
        return Err(ConvertError::InvalidRequest(
            "empty page selection for split".into(),
        ));
    }
    let src = document.path().to_path_buf();
    let sel = selection.clone();
    let out = unique_split_path(output_dir);

    let out_path = tokio::task::spawn_blocking(move || split_blocking(&src, &sel, &out))
        .await
        .map_err(|e| ConvertError::Internal(format!("split task panicked: {e}")))??;

    info!(
        "split {} pages of {} → {}",
        selection.len(),
        document.path().display(),
        out_path.display()
    );
    Ok(Document::produced(out_path, DocumentFormat::Pdf))
}

fn split_blocking(
    src: &Path,
    selection: &PageSelection,
    output: &Path,
) -> Result<PathBuf, ConvertError> {
    let doc = load_pdf(src)?;
    let total = doc.get_pages().len() as u32;

    let keep: HashSet<u32> = selection.page_numbers().map(|p| p as u32).collect();

    let mut new_doc = doc.clone();
    // Delete in reverse so earlier deletions don't shift later page numbers.
    let mut delete: Vec<u32> = (1..=total).filter(|p| !keep.contains(p)).collect();
    delete.reverse();
    for page_num in delete {
        new_doc.delete_pages(&[page_num]);
    }

    new_doc.prune_objects();
    new_doc.compress();

    new_doc
        .save(output)
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        })?;

    Ok(output.to_path_buf())
}

/// Concatenate all pages of `inputs`, in list order, into `output`.
///
/// Overwrites an existing file at `output`. On any failure nothing is left
/// at `output` that wasn't there before: the document is assembled at a
/// temp path and renamed into place only once fully written.
pub async fn merge(inputs: &[Document], output: &Path) -> Result<Document, ConvertError> {
    if inputs.is_empty() {
        return Err(ConvertError::InvalidRequest(
            "merge requires at least one input document".into(),
        ));
    }
    let paths: Vec<PathBuf> = inputs.iter().map(|d| d.path().to_path_buf()).collect();
    let out = output.to_path_buf();

    tokio::task::spawn_blocking(move || merge_blocking(&paths, &out))
        .await
        .map_err(|e| ConvertError::Internal(format!("merge task panicked: {e}")))??;

    info!("merged {} documents → {}", inputs.len(), output.display());
    Ok(Document::produced(output.to_path_buf(), DocumentFormat::Pdf))
}

fn merge_blocking(inputs: &[PathBuf], output: &Path) -> Result<(), ConvertError> {
    let mut max_id: u32 = 1;
    // Page object ids in strict input order, page order within each input.
    let mut page_order: Vec<ObjectId> = Vec::new();
    // Page dicts with their Pages-tree inheritance already folded in.
    let mut page_dicts: BTreeMap<ObjectId, Dictionary> = BTreeMap::new();
    let mut pooled_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for path in inputs {
        let mut doc = load_pdf(path)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_page_num, object_id) in doc.get_pages() {
            page_order.push(object_id);
            if let Some(dict) = resolved_page_dict(&doc, object_id) {
                page_dicts.insert(object_id, dict);
            }
        }
        pooled_objects.extend(std::mem::take(&mut doc.objects));
    }

    if page_order.is_empty() {
        return Err(ConvertError::InvalidRequest(
            "merge inputs contain no pages".into(),
        ));
    }

    let mut merged = lopdf::Document::with_version("1.5");
    let pages_id = (max_id, 0);

    // Copy every object except the old page trees; pages get re-parented
    // under the new Pages node, catalogs and outlines are rebuilt/dropped.
    for (object_id, object) in &pooled_objects {
        match dict_type(object).as_deref() {
            Some(b"Catalog") | Some(b"Pages") | Some(b"Outlines") => {}
            Some(b"Page") => {
                if let Some(dict) = page_dicts.get(object_id) {
                    let mut dict = dict.clone();
                    dict.set("Parent", Object::Reference(pages_id));
                    merged
                        .objects
                        .insert(*object_id, Object::Dictionary(dict));
                }
            }
            _ => {
                merged.objects.insert(*object_id, object.clone());
            }
        }
    }

    let kids: Vec<Object> = page_order.iter().map(|id| Object::Reference(*id)).collect();
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(page_order.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    merged
        .objects
        .insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = (max_id + 1, 0);
    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = max_id + 1;
    merged.renumber_objects();
    merged.compress();

    // Atomic placement: assemble next to the destination, rename over it.
    let tmp = output.with_extension("pdf.tmp");
    merged.save(&tmp).map_err(|e| ConvertError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })?;
    std::fs::rename(&tmp, output).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ConvertError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        }
    })?;

    debug!("merged {} pages into {}", page_order.len(), output.display());
    Ok(())
}

/// Number of pages in a PDF. Used to validate page-range expressions.
pub async fn page_count(path: &Path) -> Result<usize, ConvertError> {
    let p = path.to_path_buf();
    tokio::task::spawn_blocking(move || Ok(load_pdf(&p)?.get_pages().len()))
        .await
        .map_err(|e| ConvertError::Internal(format!("page-count task panicked: {e}")))?
}

/// Read document metadata without converting anything.
pub async fn inspect(path: &Path) -> Result<DocumentMetadata, ConvertError> {
    let p = path.to_path_buf();
    tokio::task::spawn_blocking(move || inspect_blocking(&p))
        .await
        .map_err(|e| ConvertError::Internal(format!("inspect task panicked: {e}")))?
}

fn inspect_blocking(path: &Path) -> Result<DocumentMetadata, ConvertError> {
    let doc = load_pdf(path)?;

    let info_dict = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_dict().ok());

    let get_text = |key: &[u8]| -> Option<String> {
        let dict = info_dict?;
        match dict.get(key).ok()? {
            Object::String(bytes, _) => {
                let s = String::from_utf8_lossy(bytes).trim().to_string();
                (!s.is_empty()).then_some(s)
            }
            _ => None,
        }
    };

    Ok(DocumentMetadata {
        title: get_text(b"Title"),
        author: get_text(b"Author"),
        subject: get_text(b"Subject"),
        producer: get_text(b"Producer"),
        page_count: doc.get_pages().len(),
        pdf_version: Some(doc.version.clone()),
    })
}

/// Page attributes the PDF spec lets a page inherit from its Pages
/// ancestors.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A page's dictionary with inherited attributes made explicit.
///
/// Merge discards the source Pages trees, so anything a page inherits from
/// an ancestor node (Resources, MediaBox, CropBox, Rotate) must be folded
/// into the page dict itself before re-parenting, or the merged page loses
/// its geometry and font resources.
fn resolved_page_dict(doc: &lopdf::Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?.clone();

    let mut parent = dict.get(b"Parent").ok().cloned();
    let mut depth = 0;
    while let Some(Object::Reference(ancestor)) = parent {
        depth += 1;
        // Parent cycles only occur in malformed files; bail rather than spin.
        if depth > 64 {
            break;
        }
        let Ok(ancestor_dict) = doc.get_object(ancestor).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE_PAGE_KEYS {
            if !dict.has(key) {
                if let Ok(value) = ancestor_dict.get(key) {
                    dict.set(key, value.clone());
                }
            }
        }
        parent = ancestor_dict.get(b"Parent").ok().cloned();
    }

    Some(dict)
}

fn load_pdf(path: &Path) -> Result<lopdf::Document, ConvertError> {
    lopdf::Document::load(path).map_err(|e| ConvertError::Unreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Object's /Type name, if it is a dictionary carrying one.
fn dict_type(object: &Object) -> Option<Vec<u8>> {
    object
        .as_dict()
        .ok()?
        .get(b"Type")
        .ok()?
        .as_name()
        .ok()
        .map(|n| n.to_vec())
}

fn unique_split_path(output_dir: &Path) -> PathBuf {
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut candidate = output_dir.join(format!("split_{epoch_ms}.pdf"));
    let mut bump = 0u32;
    while candidate.exists() {
        bump += 1;
        candidate = output_dir.join(format!("split_{epoch_ms}_{bump}.pdf"));
    }
    candidate
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Object, Stream};

    /// Build an n-page PDF in memory, one text line per page.
    pub(crate) fn create_test_pdf(path: &Path, num_pages: u32) {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page_ids = Vec::new();

        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                    ),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).unwrap();
    }

    /// Build an n-page PDF whose pages carry no MediaBox or Resources of
    /// their own and rely on inheriting both from the Pages node.
    pub(crate) fn create_inherited_pdf(path: &Path, num_pages: u32) {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));

        let mut page_ids = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                    ),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter(vec![(
                    "Font",
                    Object::Dictionary(Dictionary::from_iter(vec![(
                        "F1",
                        Object::Reference(font_id),
                    )])),
                )])),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).unwrap();
    }

    #[tokio::test]
    async fn split_extracts_selected_pages() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("five.pdf");
        create_test_pdf(&src, 5);

        let doc = Document::open(&src).unwrap();
        let sel = PageSelection::parse("2-3,5", 5).unwrap();
        let out = split(&doc, &sel, dir.path()).await.unwrap();

        let reread = lopdf::Document::load(out.path()).unwrap();
        assert_eq!(reread.get_pages().len(), 3);
        // Input untouched
        assert_eq!(lopdf::Document::load(&src).unwrap().get_pages().len(), 5);
    }

    #[tokio::test]
    async fn split_filenames_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("doc.pdf");
        create_test_pdf(&src, 3);
        let doc = Document::open(&src).unwrap();
        let sel = PageSelection::parse("1", 3).unwrap();

        let a = split(&doc, &sel, dir.path()).await.unwrap();
        let b = split(&doc, &sel, dir.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().exists() && b.path().exists());
    }

    #[tokio::test]
    async fn merge_concatenates_in_list_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        create_test_pdf(&a, 3);
        create_test_pdf(&b, 2);

        let out = dir.path().join("merged.pdf");
        let docs = vec![Document::open(&a).unwrap(), Document::open(&b).unwrap()];
        let merged = merge(&docs, &out).await.unwrap();

        let reread = lopdf::Document::load(merged.path()).unwrap();
        assert_eq!(reread.get_pages().len(), 5);
    }

    #[tokio::test]
    async fn merge_keeps_attributes_pages_inherited_from_their_tree() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        create_inherited_pdf(&a, 2);
        create_inherited_pdf(&b, 1);

        let out = dir.path().join("merged.pdf");
        let docs = vec![Document::open(&a).unwrap(), Document::open(&b).unwrap()];
        merge(&docs, &out).await.unwrap();

        let reread = lopdf::Document::load(&out).unwrap();
        assert_eq!(reread.get_pages().len(), 3);
        for (num, page_id) in reread.get_pages() {
            let dict = reread.get_object(page_id).unwrap().as_dict().unwrap();
            assert!(
                dict.has(b"MediaBox"),
                "page {num} lost its inherited MediaBox"
            );
            assert!(
                dict.has(b"Resources"),
                "page {num} lost its inherited Resources"
            );
        }
    }

    #[tokio::test]
    async fn merge_unreadable_input_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        create_test_pdf(&a, 2);
        let junk = dir.path().join("junk.pdf");
        std::fs::write(&junk, b"not a pdf at all").unwrap();

        let out = dir.path().join("merged.pdf");
        let docs = vec![Document::open(&a).unwrap(), Document::open(&junk).unwrap()];
        let err = merge(&docs, &out).await.unwrap_err();

        assert!(matches!(err, ConvertError::Unreadable { ref path, .. } if path == &junk));
        assert!(!out.exists(), "failed merge must not leave partial output");
    }

    #[tokio::test]
    async fn page_count_and_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("doc.pdf");
        create_test_pdf(&src, 4);

        assert_eq!(page_count(&src).await.unwrap(), 4);
        let meta = inspect(&src).await.unwrap();
        assert_eq!(meta.page_count, 4);
        assert_eq!(meta.pdf_version.as_deref(), Some("1.7"));
    }

    #[tokio::test]
    async fn unreadable_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.pdf");
        std::fs::write(&junk, b"%PDF-garbage").unwrap();
        assert!(matches!(
            page_count(&junk).await,
            Err(ConvertError::Unreadable { .. })
        ));
    }
}
