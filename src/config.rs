//! Pipeline configuration
//!
//! All components take their settings at construction time. Defaults mirror a
//! production deployment for Dutch tenders; `PipelineConfig::from_env` lets an
//! operator override individual values with `TENDER_*` variables.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Native text layer grouping settings
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Vertical distance (points) from a chunk's mean top that starts a new chunk
    pub line_break_threshold: f64,
    /// Horizontal gap (points) that separates two table cells on one row
    pub table_column_gap: f64,
    /// Minimum consecutive multi-cell rows that form a table
    pub min_table_rows: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_break_threshold: 10.0,
            table_column_gap: 20.0,
            min_table_rows: 2,
        }
    }
}

/// OCR fallback settings
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Rasterization resolution
    pub dpi: u32,
    /// Tesseract executable
    pub tesseract_binary: String,
    /// Tesseract language pack list (e.g. "nld+eng")
    pub languages: String,
    /// Tesseract page segmentation mode
    pub page_segmentation_mode: u8,
    /// Words at or below this confidence (0-100) are discarded
    pub confidence_floor: f64,
    /// Vertical grouping threshold for OCR words, in points
    pub line_break_threshold: f64,
    /// Maximum vertical spread of one OCR line chunk, in points
    pub line_height: f64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            tesseract_binary: "tesseract".to_string(),
            languages: "nld+eng".to_string(),
            page_segmentation_mode: 6,
            confidence_floor: 30.0,
            // 20px at 300 DPI
            line_break_threshold: 4.8,
            line_height: 12.0,
        }
    }
}

/// Configuration for the extraction pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum upload size in bytes (default: 50MB)
    pub max_file_size: u64,
    /// Maximum documents per batch (default: 20)
    pub max_files_per_batch: usize,
    /// Accepted language codes
    pub supported_languages: Vec<String>,
    /// Language used when a caller gives none
    pub default_language: String,
    /// Simultaneous extraction model calls (default: 3, at least 1)
    pub max_concurrent_extractions: usize,
    /// Advisory bound on a single model call (default: 30 minutes)
    pub model_timeout: Duration,
    /// Enable the result cache
    pub enable_cache: bool,
    /// Result cache time-to-live (default: 24 hours)
    pub cache_ttl: Duration,
    /// Maximum number of cached results
    pub cache_max_entries: usize,
    /// Maximum total bytes of cached results (default: 256MB)
    pub cache_max_bytes: usize,
    /// Directory for materialized uploads
    pub temp_dir: PathBuf,
    /// Always run OCR, even when the native layer has text
    pub perform_ocr: bool,
    /// Pages with fewer native characters than this are OCR candidates
    pub min_page_chars: usize,
    /// Fragments shorter than this after cleaning are dropped
    pub min_fragment_chars: usize,
    pub layout: LayoutConfig,
    pub ocr: OcrConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024, // 50MB
            max_files_per_batch: 20,
            supported_languages: ["nl", "en", "de", "fr"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_language: "nl".to_string(),
            max_concurrent_extractions: 3,
            model_timeout: Duration::from_secs(30 * 60),
            enable_cache: true,
            cache_ttl: Duration::from_secs(24 * 3600),
            cache_max_entries: 1000,
            cache_max_bytes: 256 * 1024 * 1024, // 256MB
            temp_dir: std::env::temp_dir(),
            perform_ocr: true,
            min_page_chars: 100,
            min_fragment_chars: 3,
            layout: LayoutConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from defaults overlaid with `TENDER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "TENDER_MAX_FILE_SIZE")? {
            config.max_file_size = v;
        }
        if let Some(v) = parse_var(&lookup, "TENDER_MAX_FILES_PER_BATCH")? {
            config.max_files_per_batch = v;
        }
        if let Some(v) = lookup("TENDER_SUPPORTED_LANGUAGES") {
            config.supported_languages = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("TENDER_DEFAULT_LANGUAGE") {
            config.default_language = v.trim().to_lowercase();
        }
        if let Some(v) = parse_var(&lookup, "TENDER_MAX_CONCURRENT_EXTRACTIONS")? {
            config.max_concurrent_extractions = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "TENDER_MODEL_TIMEOUT_MINUTES")? {
            config.model_timeout = Duration::from_secs(v * 60);
        }
        if let Some(v) = parse_var(&lookup, "TENDER_ENABLE_CACHE")? {
            config.enable_cache = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "TENDER_CACHE_TTL_HOURS")? {
            config.cache_ttl = Duration::from_secs(v * 3600);
        }
        if let Some(v) = parse_var(&lookup, "TENDER_CACHE_MAX_ENTRIES")? {
            config.cache_max_entries = v;
        }
        if let Some(v) = parse_var(&lookup, "TENDER_CACHE_MAX_BYTES")? {
            config.cache_max_bytes = v;
        }
        if let Some(v) = lookup("TENDER_TEMP_DIR") {
            config.temp_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_var(&lookup, "TENDER_PERFORM_OCR")? {
            config.perform_ocr = v;
        }
        if let Some(v) = parse_var(&lookup, "TENDER_MIN_PAGE_CHARS")? {
            config.min_page_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "TENDER_OCR_DPI")? {
            config.ocr.dpi = v;
        }
        if let Some(v) = lookup("TENDER_OCR_LANGUAGES") {
            config.ocr.languages = v;
        }
        if let Some(v) = lookup("TENDER_TESSERACT_BINARY") {
            config.ocr.tesseract_binary = v;
        }
        if let Some(v) = parse_var(&lookup, "TENDER_OCR_CONFIDENCE_FLOOR")? {
            config.ocr.confidence_floor = v;
        }

        if !config.supports_language(&config.default_language) {
            return Err(Error::Config {
                reason: format!(
                    "default language '{}' is not in the supported list",
                    config.default_language
                ),
            });
        }

        Ok(config)
    }

    /// Concurrency ceiling, never below one.
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent_extractions.max(1)
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages.iter().any(|l| l == language)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| Error::Config {
            reason: format!("{}={:?}: {}", key, raw, e),
        }),
    }
}
