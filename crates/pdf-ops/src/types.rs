use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfOpsError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[cfg(feature = "render")]
    #[error("Render error: {0}")]
    Render(#[from] pdfium_render::prelude::PdfiumError),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },
    #[error("No pages in document")]
    NoPages,
    #[error("No input files")]
    NoInput,
    #[error("Rendering is not available: {0}")]
    RenderUnavailable(String),
}

pub type Result<T> = std::result::Result<T, PdfOpsError>;

/// Coarse file classification, derived from the file name suffix only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Pdf,
    Image,
}

const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

impl FileKind {
    /// Extensions (lowercase, without dot) that belong to this kind
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileKind::Pdf => PDF_EXTENSIONS,
            FileKind::Image => IMAGE_EXTENSIONS,
        }
    }

    /// Classify a path by its extension. Case-insensitive.
    pub fn of(path: impl AsRef<std::path::Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        [FileKind::Pdf, FileKind::Image]
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }

    pub fn matches(self, path: impl AsRef<std::path::Path>) -> bool {
        Self::of(path) == Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_suffix() {
        assert_eq!(FileKind::of("a.pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::of("temp/42_Report.PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::of("42_img_x.jpg"), Some(FileKind::Image));
        assert_eq!(FileKind::of("scan.JPEG"), Some(FileKind::Image));
        assert_eq!(FileKind::of("scan.png"), Some(FileKind::Image));
        assert_eq!(FileKind::of("notes.txt"), None);
        assert_eq!(FileKind::of("pdf"), None);
    }

    #[test]
    fn test_matches() {
        assert!(FileKind::Pdf.matches("x.pdf"));
        assert!(!FileKind::Image.matches("x.pdf"));
        assert!(FileKind::Image.matches("x.png"));
    }
}
