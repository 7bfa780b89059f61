//! Lossless structural optimization
//!
//! No image resampling and no quality knobs: unreachable objects and empty
//! streams are dropped, objects renumbered densely and every compressible
//! stream Flate-encoded.

use crate::io::{load_pdf, save_pdf};
use crate::types::*;
use lopdf::Document;
use std::path::Path;

/// Sizes and page count reported by [`compress_pdf`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressResult {
    pub pages: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

pub async fn compress_pdf(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<CompressResult> {
    let input_bytes = tokio::fs::metadata(input.as_ref()).await?.len();
    let mut doc = load_pdf(input).await?;

    let doc = tokio::task::spawn_blocking(move || {
        optimize_document(&mut doc);
        doc
    })
    .await?;
    let pages = doc.get_pages().len();

    let output_bytes = save_pdf(doc, output).await?;

    log::debug!(
        "Compressed {} pages: {} -> {} bytes",
        pages,
        input_bytes,
        output_bytes
    );

    Ok(CompressResult {
        pages,
        input_bytes,
        output_bytes,
    })
}

/// Optimize a document in place.
pub fn optimize_document(doc: &mut Document) {
    let pruned = doc.prune_objects();
    let emptied = doc.delete_zero_length_streams();
    log::trace!(
        "Dropped {} unreachable objects and {} empty streams",
        pruned.len(),
        emptied.len()
    );
    doc.renumber_objects();
    doc.compress();
}
