//! PDF processing layer
//!
//! Native text layer extraction and page rendering use PDFium; upload
//! validation uses qpdf. OCR shells out to Tesseract.

mod enhance;
pub mod layout;
pub mod ocr;
pub mod validate;

use crate::config::{LayoutConfig, OcrConfig};
use crate::error::{Error, Result};
use crate::fragments::{FragmentSource, TextFragment};
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;

pub use enhance::enhance_for_ocr;
pub use ocr::{OcrEngine, OcrWord, TesseractCli};
pub use validate::{
    rejection_error, DocumentValidator, QpdfValidator, RejectionKind, ValidationReport,
};

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
pub(crate) fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Map PDFium errors to our error type
pub(crate) fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::Encrypted
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

/// Fragment source reading the PDF on disk with PDFium and an OCR engine
pub struct PdfFragmentSource {
    layout: LayoutConfig,
    ocr: OcrConfig,
    engine: Arc<dyn OcrEngine>,
}

impl PdfFragmentSource {
    pub fn new(layout: LayoutConfig, ocr: OcrConfig, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            layout,
            ocr,
            engine,
        }
    }

    /// PDFium text layer plus the Tesseract CLI
    pub fn with_tesseract(layout: LayoutConfig, ocr: OcrConfig) -> Self {
        let engine = TesseractCli::new(&ocr);
        if !engine.is_available() {
            tracing::warn!(
                binary = %ocr.tesseract_binary,
                "Tesseract not available, scanned pages will yield no text"
            );
        }
        Self::new(layout, ocr, Arc::new(engine))
    }
}

impl FragmentSource for PdfFragmentSource {
    fn native_fragments(&self, path: &Path) -> Result<Vec<TextFragment>> {
        layout::extract_native(path, &self.layout)
    }

    fn ocr_fragments(&self, path: &Path) -> Result<Vec<TextFragment>> {
        ocr::extract_ocr(path, self.engine.as_ref(), &self.ocr)
    }
}
