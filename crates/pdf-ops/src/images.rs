//! Composing images into a PDF
//!
//! Each image becomes one page whose MediaBox matches the image size
//! (one pixel per point). Pixels are normalized to 8-bit RGB and embedded
//! as an image XObject; the document is Flate-compressed on the way out.

use crate::io::save_pdf;
use crate::types::*;
use image::{ImageReader, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};

/// Resource name of the image on every page
const IMAGE_RESOURCE: &str = "Im0";

/// Compose the images at `inputs`, in order, into a PDF at `output`.
///
/// Returns the page count, which equals the number of inputs.
pub async fn images_to_pdf(inputs: &[impl AsRef<Path>], output: impl AsRef<Path>) -> Result<usize> {
    if inputs.is_empty() {
        return Err(PdfOpsError::NoInput);
    }

    let paths: Vec<PathBuf> = inputs.iter().map(|p| p.as_ref().to_owned()).collect();
    let doc = tokio::task::spawn_blocking(move || {
        let images = paths
            .iter()
            .map(|path| load_rgb(path))
            .collect::<Result<Vec<_>>>()?;
        compose_images(images)
    })
    .await??;

    let page_count = doc.get_pages().len();
    save_pdf(doc, output).await?;
    Ok(page_count)
}

/// Decode an image, sniffing the format from content, and convert to RGB.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.into_rgb8())
}

/// Build a document with one page per image.
pub fn compose_images(images: Vec<RgbImage>) -> Result<Document> {
    if images.is_empty() {
        return Err(PdfOpsError::NoInput);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(images.len());
    for image in images {
        let page_id = add_image_page(&mut doc, image, pages_id);
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(kids.len() as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    doc.compress();
    Ok(doc)
}

fn add_image_page(doc: &mut Document, image: RgbImage, parent_id: ObjectId) -> ObjectId {
    let (width, height) = image.dimensions();

    let image_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(width as i64)),
        ("Height", Object::Integer(height as i64)),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ]);
    let image_id = doc.add_object(Stream::new(image_dict, image.into_raw()));

    // Scale the unit square to the page and paint the image into it
    let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/{IMAGE_RESOURCE} Do\nQ\n");
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set(IMAGE_RESOURCE, Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(parent_id));
    page_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width as i64),
            Object::Integer(height as i64),
        ]),
    );
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set("Contents", Object::Reference(content_id));

    doc.add_object(page_dict)
}
