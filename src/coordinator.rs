//! Extraction coordinator: runs one document through the whole pipeline
//!
//! Input errors are returned as `Err`. Once a document has passed
//! validation, every failure becomes an error-tagged [`DocumentResult`].

use crate::attribution::{attribute_fields, FragmentIndex};
use crate::classify::classify_document;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::extraction::{prompt_for_language, ExtractionModel, FieldMap, ModelError, TenderFields};
use crate::fragments::{extract_fragments, FragmentSource, TextFragment};
use crate::merge::{merge, MergedResult};
use crate::pdf::{rejection_error, DocumentValidator, PdfFragmentSource, QpdfValidator};
use crate::result::DocumentResult;
use crate::scoring;
use crate::source::{cache_key, content_hash, materialize, CacheEntry, CacheStore, MemoryCache};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// One uploaded document
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub filename: String,
    pub content: Vec<u8>,
}

impl DocumentInput {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// Terminal state of one document in a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Went through the pipeline; the result may still be error-tagged
    Completed {
        filename: String,
        result: DocumentResult,
    },
    /// Rejected before any pipeline work
    Rejected { filename: String, error: String },
}

impl DocumentOutcome {
    pub fn result(&self) -> Option<&DocumentResult> {
        match self {
            DocumentOutcome::Completed { result, .. } => Some(result),
            DocumentOutcome::Rejected { .. } => None,
        }
    }
}

/// Outcome of [`ExtractionCoordinator::process_batch`]
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Per-document outcomes in submission order
    pub documents: Vec<DocumentOutcome>,
    pub processed_count: usize,
    pub rejected_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<MergedResult>,
}

/// Runs documents through validation, fragment extraction, the extraction
/// model and attribution, with a content-addressed result cache in front.
///
/// At most `max_concurrent_extractions` documents are inside the model call
/// at any time; everything else runs unbounded.
pub struct ExtractionCoordinator<M, C> {
    model: M,
    cache: Option<C>,
    source: Arc<dyn FragmentSource>,
    validator: Arc<dyn DocumentValidator>,
    model_slots: Semaphore,
    config: Arc<PipelineConfig>,
}

impl<M: ExtractionModel> ExtractionCoordinator<M, MemoryCache> {
    /// Coordinator over PDFium, Tesseract and qpdf with an in-process cache.
    pub fn with_pdf_backend(model: M, config: PipelineConfig) -> Self {
        let source = Arc::new(PdfFragmentSource::with_tesseract(
            config.layout.clone(),
            config.ocr.clone(),
        ));
        let validator = Arc::new(QpdfValidator::new(config.max_file_size));
        let cache = config
            .enable_cache
            .then(|| MemoryCache::new(config.cache_max_entries, config.cache_max_bytes));

        Self::new(model, cache, source, validator, config)
    }
}

impl<M: ExtractionModel, C: CacheStore> ExtractionCoordinator<M, C> {
    pub fn new(
        model: M,
        cache: Option<C>,
        source: Arc<dyn FragmentSource>,
        validator: Arc<dyn DocumentValidator>,
        config: PipelineConfig,
    ) -> Self {
        let model_slots = Semaphore::new(config.concurrency_limit());
        Self {
            model,
            cache: if config.enable_cache { cache } else { None },
            source,
            validator,
            model_slots,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&C> {
        self.cache.as_ref()
    }

    /// Extract one document.
    pub async fn process(
        &self,
        content: &[u8],
        filename: &str,
        language: &str,
    ) -> Result<DocumentResult> {
        if !self.config.supports_language(language) {
            return Err(Error::UnsupportedLanguage {
                language: language.to_string(),
            });
        }
        if content.is_empty() {
            return Err(Error::EmptyDocument {
                filename: filename.to_string(),
            });
        }

        let hash = content_hash(content);
        let key = cache_key(&hash, language);

        if let Some(cached) = self.cached(&key).await {
            tracing::info!(filename = %filename, "Returning cached extraction");
            return Ok(cached);
        }

        // Removed from disk when dropped at the end of this call
        let staged = materialize(content, &self.config.temp_dir)?;
        let path = staged.path().to_path_buf();

        let page_count = self.validate(path.clone(), content.len() as u64).await?;

        let fragments = match self.fragments(path, language).await {
            Ok(fragments) => fragments,
            Err(e) if e.is_input_error() => return Err(e),
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Fragment extraction failed");
                return Ok(DocumentResult::error(filename, language, e.to_string()));
            }
        };

        if fragments.is_empty() {
            tracing::warn!(filename = %filename, "No text found in document");
            return Ok(DocumentResult::error(
                filename,
                language,
                "No text could be extracted from the document",
            ));
        }

        let text = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let raw = match self.call_model(&text, language).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Extraction model failed");
                return Ok(DocumentResult::error(filename, language, e.to_string()));
            }
        };

        let result = build_result(filename, language, &raw, &fragments, page_count);
        tracing::info!(
            filename = %filename,
            document_type = ?result.document_type,
            fragments = result.fragment_count,
            attributed = result.source_attribution.len(),
            completeness = result.completeness_score,
            "Document extracted"
        );

        self.store(&key, hash, &result).await;
        Ok(result)
    }

    /// Extract several documents concurrently and optionally merge them.
    ///
    /// Outcomes are reported in submission order. Merging waits until every
    /// document is terminal and only sees completed results.
    pub async fn process_batch(
        &self,
        files: &[DocumentInput],
        language: &str,
        merge_results: bool,
        infer_relationships: bool,
    ) -> Result<BatchResult> {
        if files.len() > self.config.max_files_per_batch {
            return Err(Error::BatchTooLarge {
                count: files.len(),
                max: self.config.max_files_per_batch,
            });
        }

        let outcomes = futures_util::future::join_all(files.iter().map(|file| async move {
            match self.process(&file.content, &file.filename, language).await {
                Ok(result) => DocumentOutcome::Completed {
                    filename: file.filename.clone(),
                    result,
                },
                Err(e) => {
                    tracing::warn!(filename = %file.filename, error = %e, "Document rejected");
                    DocumentOutcome::Rejected {
                        filename: file.filename.clone(),
                        error: e.client_message(),
                    }
                }
            }
        }))
        .await;

        let processed_count = outcomes.iter().filter(|o| o.result().is_some()).count();
        let rejected_count = outcomes.len() - processed_count;

        let merged = merge_results.then(|| {
            let results: Vec<DocumentResult> =
                outcomes.iter().filter_map(|o| o.result()).cloned().collect();
            merge(&results, infer_relationships)
        });

        Ok(BatchResult {
            documents: outcomes,
            processed_count,
            rejected_count,
            merged,
        })
    }

    /// Drop the cached extraction for these bytes and language.
    pub async fn invalidate(&self, content: &[u8], language: &str) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        let key = cache_key(&content_hash(content), language);
        match cache.invalidate(&key).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Cache unreachable, nothing invalidated");
                false
            }
        }
    }

    async fn cached(&self, key: &str) -> Option<DocumentResult> {
        let cache = self.cache.as_ref()?;

        let raw = match cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache unreachable, extracting uncached");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry.result),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    async fn store(&self, key: &str, content_hash: String, result: &DocumentResult) {
        let Some(cache) = &self.cache else {
            return;
        };

        let entry = CacheEntry {
            result: result.clone(),
            cached_at: Utc::now(),
            content_hash,
        };
        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Could not serialize cache entry");
                return;
            }
        };

        match cache.set_with_ttl(key, value, self.config.cache_ttl).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(key = %key, "Cache declined entry"),
            Err(e) => tracing::warn!(error = %e, "Cache unreachable, result not stored"),
        }
    }

    async fn validate(&self, path: PathBuf, size: u64) -> Result<Option<u32>> {
        let validator = Arc::clone(&self.validator);
        let report = tokio::task::spawn_blocking(move || validator.validate(&path))
            .await
            .map_err(|e| Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })??;

        if !report.valid {
            return Err(rejection_error(&report, size, self.config.max_file_size));
        }
        Ok(report.page_count)
    }

    async fn fragments(&self, path: PathBuf, language: &str) -> Result<Vec<TextFragment>> {
        let source = Arc::clone(&self.source);
        let config = Arc::clone(&self.config);
        let language = language.to_string();

        tokio::task::spawn_blocking(move || {
            extract_fragments(source.as_ref(), &path, &language, &config)
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })?
    }

    /// The only step gated by the concurrency limit.
    async fn call_model(
        &self,
        text: &str,
        language: &str,
    ) -> std::result::Result<FieldMap, ModelError> {
        let _slot = self
            .model_slots
            .acquire()
            .await
            .map_err(|_| ModelError::Unavailable("extraction slots closed".to_string()))?;

        let prompt = prompt_for_language(language);
        let timeout = self.config.model_timeout;

        tokio::time::timeout(timeout, self.model.extract(text, prompt))
            .await
            .map_err(|_| ModelError::Timeout {
                seconds: timeout.as_secs(),
            })?
    }
}

fn build_result(
    filename: &str,
    language: &str,
    raw: &FieldMap,
    fragments: &[TextFragment],
    page_count: Option<u32>,
) -> DocumentResult {
    let fields = TenderFields::from_field_map(raw);
    let index = FragmentIndex::new(fragments);
    let timestamp = Utc::now();
    let source_attribution = attribute_fields(&fields, raw, &index, filename, timestamp);

    let completeness_score = scoring::completeness(&fields);
    let confidence_scores =
        scoring::confidence_scores(&fields, scoring::base_confidence(fragments));

    DocumentResult {
        document_id: Uuid::new_v4(),
        filename: filename.to_string(),
        document_type: classify_document(filename),
        language: language.to_string(),
        extraction_timestamp: timestamp,
        fields,
        source_attribution,
        completeness_score,
        confidence_scores,
        page_count,
        fragment_count: fragments.len(),
    }
}
