//! Splitting a document at a page boundary

use crate::io::{load_pdf, save_pdf};
use crate::types::*;
use lopdf::Document;
use std::ops::RangeInclusive;
use std::path::Path;

/// Page counts of the two halves written by [`split_pdf`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitResult {
    pub first_pages: usize,
    pub second_pages: usize,
}

/// Valid split boundaries for a document with `total_pages` pages.
///
/// Empty when the document has fewer than two pages.
pub fn split_bounds(total_pages: usize) -> RangeInclusive<usize> {
    1..=total_pages.saturating_sub(1)
}

/// Split the PDF at `input` after page `at` (1-indexed).
///
/// Pages `1..=at` go to `first`, the rest to `second`. Fails with
/// [`PdfOpsError::PageOutOfRange`] unless `1 <= at < total_pages`.
pub async fn split_pdf(
    input: impl AsRef<Path>,
    at: usize,
    first: impl AsRef<Path>,
    second: impl AsRef<Path>,
) -> Result<SplitResult> {
    let doc = load_pdf(input).await?;
    let (head, tail) = tokio::task::spawn_blocking(move || split_document(&doc, at)).await??;

    let result = SplitResult {
        first_pages: head.get_pages().len(),
        second_pages: tail.get_pages().len(),
    };

    save_pdf(head, first).await?;
    save_pdf(tail, second).await?;
    Ok(result)
}

/// Split a document after page `at` into two independent documents.
pub fn split_document(doc: &Document, at: usize) -> Result<(Document, Document)> {
    let total = doc.get_pages().len();
    if total == 0 {
        return Err(PdfOpsError::NoPages);
    }
    if !split_bounds(total).contains(&at) {
        return Err(PdfOpsError::PageOutOfRange { page: at, total });
    }

    Ok((
        extract_pages(doc, 1..=at, total),
        extract_pages(doc, at + 1..=total, total),
    ))
}

/// Copy of `doc` keeping only the pages in `keep`
fn extract_pages(doc: &Document, keep: RangeInclusive<usize>, total: usize) -> Document {
    let dropped: Vec<u32> = (1..=total)
        .filter(|page| !keep.contains(page))
        .map(|page| page as u32)
        .collect();

    let mut part = doc.clone();
    part.delete_pages(&dropped);
    part.prune_objects();
    part.renumber_objects();
    part
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bounds() {
        assert_eq!(split_bounds(5), 1..=4);
        assert!(split_bounds(2).contains(&1));
        assert!(split_bounds(1).is_empty());
        assert!(split_bounds(0).is_empty());
    }
}
