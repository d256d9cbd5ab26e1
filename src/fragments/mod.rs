//! Positioned text fragments
//!
//! A document is turned into an ordered list of [`TextFragment`]s: native
//! text-layer chunks and OCR lines are grouped from positioned words
//! ([`grouping`]), chosen per page ([`reconcile`]) and cleaned with global
//! character offsets ([`normalize`]).

pub mod grouping;
pub mod normalize;
pub mod reconcile;

use crate::config::PipelineConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use grouping::{group_words, GroupingRule, PositionedWord};
pub use normalize::{clean_text, normalize_fragments};
pub use reconcile::{reconcile_pages, should_run_ocr};

/// How a fragment's text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Native,
    Ocr,
}

/// Structural kind of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Paragraph,
    Table,
    OcrLine,
}

/// A positioned unit of extracted text.
///
/// `bbox` is `[x0, y0, x1, y1]` in PDF points with the origin at the top-left
/// of the page. `char_start`/`char_end` are only meaningful after
/// normalization, which assigns them across the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// 1-based page number
    pub page: u32,
    pub bbox: [f64; 4],
    pub char_start: usize,
    pub char_end: usize,
    pub extraction_method: ExtractionMethod,
    pub chunk_type: ChunkType,
    /// Recognition confidence in [0, 1]; OCR fragments only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TextFragment {
    /// Character count of the fragment text
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Produces raw fragments from a PDF on disk.
///
/// Implementations do blocking work (PDFium, subprocesses) and are called
/// from `spawn_blocking`.
pub trait FragmentSource: Send + Sync {
    /// Fragments from the embedded text layer. An empty list means the
    /// document has no extractable text.
    fn native_fragments(&self, path: &Path) -> Result<Vec<TextFragment>>;

    /// Fragments recognized from rendered page images.
    fn ocr_fragments(&self, path: &Path) -> Result<Vec<TextFragment>>;
}

/// Run the full fragment pipeline for one document: native extraction, OCR
/// when warranted, per-page reconciliation and normalization.
///
/// A failing OCR pass degrades to native-only output; a failing native pass
/// is an error.
pub fn extract_fragments(
    source: &dyn FragmentSource,
    path: &Path,
    language: &str,
    config: &PipelineConfig,
) -> Result<Vec<TextFragment>> {
    let native = source.native_fragments(path)?;

    let ocr = if should_run_ocr(&native, config.perform_ocr) {
        match source.ocr_fragments(path) {
            Ok(fragments) => fragments,
            Err(e) => {
                tracing::warn!(error = %e, "OCR pass failed, continuing with native text");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    tracing::debug!(
        native = native.len(),
        ocr = ocr.len(),
        "Reconciling fragment sources"
    );

    let merged = reconcile_pages(native, ocr, config.min_page_chars);
    Ok(normalize_fragments(
        merged,
        language,
        config.min_fragment_chars,
    ))
}
