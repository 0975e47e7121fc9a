//! PDF page rendering via PDFium.
//!
//! `PdfiumRenderer` holds no library handle: `Pdfium` is `!Send`, so each
//! call binds the library afresh (the dynamic loader caches it).

use std::io::Cursor;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::{ExtractionError, PdfPageRenderer};

/// Upper bound for either side of a rendered page.
const MAX_DIMENSION_PX: u32 = 4096;

pub const DEFAULT_RENDER_DPI: u32 = 200;

const POINTS_PER_INCH: f32 = 72.0;

pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fails when the PDFium library cannot be loaded.
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Lookup order: `PDFIUM_DYNAMIC_LIB_PATH`, next to the executable,
/// `<exe_dir>/lib`, then the system search path.
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::PdfRendering {
                page: 0,
                reason: format!("Failed to load PDFium from {path}: {e}"),
            }
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        for dir in [exe_dir.clone(), exe_dir.join("lib")] {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %dir.display(), "Loaded PDFium next to executable");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings =
        Pdfium::bind_to_system_library().map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: format!(
                "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
            ),
        })?;
    Ok(Pdfium::new(bindings))
}

fn map_load_error(e: PdfiumError) -> ExtractionError {
    let lower = e.to_string().to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDF: {e}"),
        }
    }
}

/// Pixel size for a page at `dpi`, each side in `[1, MAX_DIMENSION_PX]`,
/// aspect ratio kept when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        let pages = document.pages();

        let page_index = u16::try_from(page_number).map_err(|_| ExtractionError::PdfRendering {
            page: page_number,
            reason: format!("Page index {page_number} exceeds u16 maximum"),
        })?;
        let page = pages
            .get(page_index)
            .map_err(|_| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!(
                    "Page {page_number} out of range (document has {} pages)",
                    pages.len()
                ),
            })?;

        let (target_w, target_h) =
            compute_render_dimensions(page.width().value, page.height().value, dpi);
        if target_w == MAX_DIMENSION_PX || target_h == MAX_DIMENSION_PX {
            warn!(page = page_number, target_w, target_h, "Page render size capped");
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!("Rendering failed: {e}"),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        let png_bytes = cursor.into_inner();

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            "Rendered PDF page"
        );
        Ok(png_bytes)
    }
}

#[cfg(test)]
pub(crate) use mock::MockPdfPageRenderer;

#[cfg(test)]
mod mock {
    use super::*;

    /// Returns a 1x1 PNG for each page in range.
    pub struct MockPdfPageRenderer {
        page_count: usize,
    }

    impl MockPdfPageRenderer {
        pub fn new(page_count: usize) -> Self {
            Self { page_count }
        }
    }

    impl PdfPageRenderer for MockPdfPageRenderer {
        fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
            Ok(self.page_count)
        }

        fn render_page(
            &self,
            _pdf_bytes: &[u8],
            page_number: usize,
            _dpi: u32,
        ) -> Result<Vec<u8>, ExtractionError> {
            if page_number >= self.page_count {
                return Err(ExtractionError::PdfRendering {
                    page: page_number,
                    reason: format!("Page {page_number} out of range"),
                });
            }
            let mut cursor = Cursor::new(Vec::new());
            image::DynamicImage::new_rgb8(1, 1)
                .write_to(&mut cursor, ImageOutputFormat::Png)
                .unwrap();
            Ok(cursor.into_inner())
        }
    }
}
