//! PDF and image operations behind the bot: merge, split, compress,
//! images-to-PDF and page rasterization.

mod compress;
mod images;
mod io;
mod merge;
mod render;
mod split;
mod types;

pub use compress::{CompressResult, compress_pdf, optimize_document};
pub use images::{compose_images, images_to_pdf, load_rgb};
pub use io::{load_all, load_pdf, save_pdf};
pub use merge::{merge_documents, merge_pdfs};
pub use render::{
    DEFAULT_RENDER_WIDTH, Rasterizer, UnavailableRasterizer, page_image_path, rasterize_pdf,
};
pub use split::{SplitResult, split_bounds, split_document, split_pdf};
pub use types::*;

#[cfg(feature = "render")]
pub use render::PdfiumRasterizer;
