//! PDF rasterisation: render one page to a `DynamicImage` via pdfium.
//!
//! ## Why a trait?
//!
//! The pipeline only needs `page_count` and `render_page`; putting them
//! behind [`PageRenderer`] lets tests drive the runner with a scripted
//! renderer and keeps pdfium out of the pipeline's unit tests entirely.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking-pool thread so Tokio workers never stall during rendering.
//!
//! The source document is read-only for the whole run. pdfium document
//! handles are tied to the thread that opened them, so the renderer
//! validates the file and counts pages once at open, then re-opens the
//! file inside `spawn_blocking` for each rendered page.

use crate::error::TranslateError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of page images for the pipeline.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Total pages in the open document.
    fn page_count(&self) -> usize;

    /// Rasterise the page at `index` (0-based).
    ///
    /// The error is a human-readable detail string; the page translator
    /// wraps it into a per-page `Render` failure.
    async fn render_page(&self, index: usize) -> Result<DynamicImage, String>;
}

/// Production renderer backed by pdfium.
pub struct PdfiumRenderer {
    path: PathBuf,
    max_pixels: u32,
    page_count: usize,
}

impl PdfiumRenderer {
    /// Open and validate a PDF file.
    ///
    /// Checks existence, readability, and the `%PDF` magic bytes before
    /// handing the file to pdfium, so callers get a meaningful error
    /// rather than a pdfium crash on arbitrary input.
    pub async fn open(path: impl AsRef<Path>, max_pixels: u32) -> Result<Self, TranslateError> {
        let path = path.as_ref().to_path_buf();
        validate_pdf_file(&path)?;

        let count_path = path.clone();
        let page_count = tokio::task::spawn_blocking(move || page_count_blocking(&count_path))
            .await
            .map_err(|e| TranslateError::Internal(format!("page-count task panicked: {e}")))??;

        info!("PDF loaded: {} pages", page_count);
        Ok(Self {
            path,
            max_pixels,
            page_count,
        })
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn render_page(&self, index: usize) -> Result<DynamicImage, String> {
        let path = self.path.clone();
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || render_page_blocking(&path, index, max_pixels))
            .await
            .map_err(|e| format!("render task panicked: {e}"))?
    }
}

/// Validate existence, read permission, and PDF magic bytes.
fn validate_pdf_file(path: &Path) -> Result<(), TranslateError> {
    if !path.exists() {
        return Err(TranslateError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(TranslateError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TranslateError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(TranslateError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

fn page_count_blocking(path: &Path) -> Result<usize, TranslateError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| TranslateError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;
    Ok(document.pages().len() as usize)
}

fn render_page_blocking(
    path: &Path,
    index: usize,
    max_pixels: u32,
) -> Result<DynamicImage, String> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| format!("failed to reopen document: {e:?}"))?;

    let pages = document.pages();
    if index >= pages.len() as usize {
        return Err(format!(
            "page index {} out of range (total {})",
            index,
            pages.len()
        ));
    }

    let page = pages
        .get(index as u16)
        .map_err(|e| format!("failed to load page: {e:?}"))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| format!("rasterisation failed: {e:?}"))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        index + 1,
        image.width(),
        image.height()
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_reported() {
        let err = validate_pdf_file(Path::new("/nonexistent/book.pdf")).unwrap_err();
        assert!(matches!(err, TranslateError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_magic_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<html>not a pdf</html>").unwrap();
        let err = validate_pdf_file(tmp.path()).unwrap_err();
        match err {
            TranslateError::NotAPdf { magic, .. } => assert_eq!(&magic, b"<htm"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%rest-of-document").unwrap();
        validate_pdf_file(tmp.path()).expect("magic bytes should pass validation");
    }
}
