//! OCR fallback: render pages, enhance, recognize with Tesseract

use super::enhance::enhance_for_ocr;
use super::{create_pdfium, map_pdfium_error};
use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::fragments::grouping::chunk_to_fragment;
use crate::fragments::{
    group_words, ChunkType, ExtractionMethod, GroupingRule, PositionedWord, TextFragment,
};
use image::GrayImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::process::Command;

/// A recognized word in image pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Tesseract confidence, 0-100 (-1 when unassigned)
    pub confidence: f64,
}

/// Recognizes words on a page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrWord>>;
}

/// Tesseract invoked as a subprocess with TSV output
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    languages: String,
    page_segmentation_mode: u8,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_binary.clone(),
            languages: config.languages.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
        }
    }

    /// Whether the configured binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrWord>> {
        let file = tempfile::Builder::new()
            .prefix("tender-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(file.path(), image::ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .arg("tsv")
            .output()
            .map_err(|e| Error::Ocr {
                reason: format!("Failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(Error::Ocr {
                reason: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse Tesseract TSV output, keeping word-level rows (level 5).
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 || fields[0].trim() != "5" {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let (Ok(left), Ok(top), Ok(width), Ok(height), Ok(confidence)) = (
            fields[6].parse::<u32>(),
            fields[7].parse::<u32>(),
            fields[8].parse::<u32>(),
            fields[9].parse::<u32>(),
            fields[10].trim().parse::<f64>(),
        ) else {
            continue;
        };

        words.push(OcrWord {
            text: text.to_string(),
            left,
            top,
            width,
            height,
            confidence,
        });
    }

    words
}

/// Convert recognized words on one page into OCR line fragments.
///
/// Words at or below the confidence floor are dropped, boxes are scaled from
/// pixels at `config.dpi` to PDF points.
pub fn words_to_fragments(words: &[OcrWord], page: u32, config: &OcrConfig) -> Vec<TextFragment> {
    let scale = 72.0 / config.dpi.max(1) as f64;

    let positioned: Vec<PositionedWord> = words
        .iter()
        .filter(|w| w.confidence > config.confidence_floor)
        .map(|w| PositionedWord {
            text: w.text.clone(),
            x0: w.left as f64 * scale,
            top: w.top as f64 * scale,
            x1: (w.left + w.width) as f64 * scale,
            bottom: (w.top + w.height) as f64 * scale,
            confidence: Some((w.confidence / 100.0).clamp(0.0, 1.0)),
        })
        .collect();

    let rule = GroupingRule {
        line_break_threshold: config.line_break_threshold,
        max_line_spread: Some(config.line_height),
    };

    group_words(&positioned, &rule)
        .iter()
        .filter_map(|chunk| chunk_to_fragment(chunk, page, ExtractionMethod::Ocr, ChunkType::OcrLine))
        .collect()
}

/// Rasterize every page of the PDF at `path` and OCR it.
pub fn extract_ocr(path: &Path, engine: &dyn OcrEngine, config: &OcrConfig) -> Result<Vec<TextFragment>> {
    let data = std::fs::read(path)?;

    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(&data, None)
        .map_err(map_pdfium_error)?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(config.dpi as f32 / 72.0);

    let mut fragments = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index as u32 + 1;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to render page {}: {}", page_number, e),
            })?;

        let enhanced = enhance_for_ocr(&bitmap.as_image());
        let words = engine.recognize(&enhanced)?;
        let page_fragments = words_to_fragments(&words, page_number, config);

        tracing::debug!(
            page = page_number,
            words = words.len(),
            lines = page_fragments.len(),
            "OCR page recognized"
        );
        fragments.extend(page_fragments);
    }

    Ok(fragments)
}
