pub mod ocr;
pub mod pdfium;

pub use ocr::*;
pub use pdfium::*;

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot reach OCR service at {0}")]
    OcrConnection(String),

    #[error("OCR service returned {status}: {body}")]
    OcrUpstream { status: u16, body: String },

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF is password protected")]
    PdfEncrypted,

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// OCR backend: one image in, its text out.
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, filename: &str, image_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Renders PDF pages to PNG so they can go through OCR.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Image,
}

fn file_kind(filename: &str) -> Result<FileKind, ExtractionError> {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Ok(FileKind::Pdf),
        "png" | "jpg" | "jpeg" => Ok(FileKind::Image),
        _ => Err(ExtractionError::UnsupportedFormat(filename.to_string())),
    }
}

/// Raw text from an uploaded lab report.
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
    renderer: Arc<dyn PdfPageRenderer>,
    dpi: u32,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, renderer: Arc<dyn PdfPageRenderer>) -> Self {
        Self {
            ocr,
            renderer,
            dpi: DEFAULT_RENDER_DPI,
        }
    }

    /// Dispatch on the (case-insensitive) extension. PDF pages are rendered
    /// and OCR'd one at a time, texts joined with `\n` in page order.
    pub fn extract_text(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        match file_kind(filename)? {
            FileKind::Image => self.ocr.ocr_image(filename, bytes),
            FileKind::Pdf => {
                let pages = self.renderer.page_count(bytes)?;
                tracing::info!(pages, "Extracting text from PDF");

                let mut texts = Vec::with_capacity(pages);
                for page in 0..pages {
                    let png = self.renderer.render_page(bytes, page, self.dpi)?;
                    let page_name = format!("page_{}.png", page + 1);
                    texts.push(self.ocr.ocr_image(&page_name, &png)?);
                }
                Ok(texts.join("\n"))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use super::*;

    /// Returns a fixed text per call, or the n-th entry of `pages`.
    #[derive(Default)]
    pub struct MockOcr {
        pub pages: Vec<String>,
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl MockOcr {
        pub fn with_pages(pages: &[&str]) -> Self {
            Self {
                pages: pages.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl OcrEngine for MockOcr {
        fn ocr_image(&self, filename: &str, _image_bytes: &[u8]) -> Result<String, ExtractionError> {
            if self.fail {
                return Err(ExtractionError::OcrUpstream {
                    status: 503,
                    body: "ocr unavailable".into(),
                });
            }
            let mut calls = self.calls.lock().unwrap();
            let text = self
                .pages
                .get(calls.len())
                .cloned()
                .unwrap_or_default();
            calls.push(filename.to_string());
            Ok(text)
        }
    }
}
