//! Rasterizing PDF pages to JPEG files

use crate::types::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "render")]
use pdfium_render::prelude::*;

/// Renders every page of a PDF to an image file.
///
/// Implementations are synchronous and may block. Call them through
/// [`rasterize_pdf`], which also keeps calls from overlapping.
pub trait Rasterizer: Send + Sync {
    /// Render all pages of `pdf` into `out_dir`, returning the image paths
    /// in page order. Files are named with [`page_image_path`].
    fn rasterize(&self, pdf: &Path, out_dir: &Path, stem: &str) -> Result<Vec<PathBuf>>;
}

/// `{out_dir}/{stem}_page_{page}.jpg`, with `page` 1-indexed
pub fn page_image_path(out_dir: &Path, stem: &str, page: usize) -> PathBuf {
    out_dir.join(format!("{stem}_page_{page}.jpg"))
}

/// Held for every rasterizer call. Pdfium keeps process-global state, and
/// binding or dropping a handle while another thread renders is unsound.
static RENDER_LOCK: Mutex<()> = Mutex::new(());

fn render_exclusive() -> MutexGuard<'static, ()> {
    RENDER_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a rasterizer on the blocking pool.
///
/// Calls are serialized process-wide, so concurrent users render one
/// document at a time.
pub async fn rasterize_pdf(
    rasterizer: Arc<dyn Rasterizer>,
    pdf: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    stem: impl Into<String>,
) -> Result<Vec<PathBuf>> {
    let pdf = pdf.as_ref().to_owned();
    let out_dir = out_dir.as_ref().to_owned();
    let stem = stem.into();
    tokio::task::spawn_blocking(move || {
        let _exclusive = render_exclusive();
        rasterizer.rasterize(&pdf, &out_dir, &stem)
    })
    .await?
}

/// Stand-in used when no rendering backend could be set up
#[derive(Debug, Clone)]
pub struct UnavailableRasterizer {
    reason: String,
}

impl UnavailableRasterizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Rasterizer for UnavailableRasterizer {
    fn rasterize(&self, _pdf: &Path, _out_dir: &Path, _stem: &str) -> Result<Vec<PathBuf>> {
        Err(PdfOpsError::RenderUnavailable(self.reason.clone()))
    }
}

/// Default rendered width in pixels (A4 at 150 DPI)
pub const DEFAULT_RENDER_WIDTH: i32 = 1240;

/// Pdfium-backed rasterizer.
///
/// Binds the library on every call, since a `Pdfium` handle cannot move
/// between blocking threads.
#[cfg(feature = "render")]
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    target_width: i32,
}

#[cfg(feature = "render")]
impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>, target_width: i32) -> Self {
        Self {
            library_dir,
            target_width,
        }
    }

    /// Check that the library can be bound at all
    pub fn check_binding(&self) -> Result<()> {
        let _exclusive = render_exclusive();
        self.bind().map(|_| ())
    }

    /// Bind Pdfium, trying the configured directory first, then the system library
    fn bind(&self) -> Result<Pdfium> {
        if let Some(dir) = &self.library_dir {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
                Ok(binding) => return Ok(Pdfium::new(binding)),
                Err(e) => log::warn!(
                    "Failed to bind Pdfium from {}: {}, falling back to system library",
                    dir.display(),
                    e
                ),
            }
        }

        Ok(Pdfium::bind_to_system_library().map(Pdfium::new)?)
    }

    fn render_pages(
        &self,
        pdfium: &Pdfium,
        pdf: &Path,
        out_dir: &Path,
        stem: &str,
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let document = pdfium.load_pdf_from_file(pdf, None)?;
        let config = PdfRenderConfig::new().set_target_width(self.target_width);

        for (index, page) in document.pages().iter().enumerate() {
            let image = page.render_with_config(&config)?.as_image().into_rgb8();
            let path = page_image_path(out_dir, stem, index + 1);
            image.save_with_format(&path, image::ImageFormat::Jpeg)?;
            written.push(path);
        }

        Ok(())
    }
}

#[cfg(feature = "render")]
impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &Path, out_dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        let pdfium = self.bind()?;
        let mut written = Vec::new();

        if let Err(e) = self.render_pages(&pdfium, pdf, out_dir, stem, &mut written) {
            // Leave nothing behind for a half-rendered document
            for path in &written {
                if let Err(remove_err) = std::fs::remove_file(path) {
                    log::warn!("Failed to remove {}: {}", path.display(), remove_err);
                }
            }
            return Err(e);
        }

        Ok(written)
    }
}
