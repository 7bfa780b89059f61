//! Reading and writing staged documents
//!
//! Parsing and serialization are CPU-bound, so both run on the blocking
//! pool; only the file reads and writes stay on the async runtime.

use crate::types::*;
use lopdf::Document;
use std::path::Path;

/// Read and parse the PDF at `path`
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let doc = tokio::task::spawn_blocking(move || Document::load_mem(&bytes)).await??;
    log::trace!("Loaded {} ({} pages)", path.display(), doc.get_pages().len());
    Ok(doc)
}

/// Load every input in order. The first unreadable one aborts the batch.
pub async fn load_all(paths: &[impl AsRef<Path>]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        documents.push(load_pdf(path).await?);
    }
    Ok(documents)
}

/// Serialize `doc` and write it to `path`, returning the size written
pub async fn save_pdf(mut doc: Document, path: impl AsRef<Path>) -> Result<u64> {
    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    })
    .await??;

    tokio::fs::write(path.as_ref(), &bytes).await?;
    Ok(bytes.len() as u64)
}
