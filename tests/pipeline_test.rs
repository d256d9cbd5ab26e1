//! Integration tests for the extraction pipeline
//!
//! PDFium, Tesseract and the extraction service are replaced by in-test
//! implementations of their traits.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tender_extract::fragments::{ChunkType, ExtractionMethod};
use tender_extract::source::cache_key;
use tender_extract::{
    merge, AttributionEntry, CacheStore, DocumentInput, DocumentOutcome, DocumentResult,
    DocumentType, DocumentValidator, Error, ExtractionCoordinator, ExtractionModel, FieldMap,
    FragmentSource, MemoryCache, ModelError, PipelineConfig, RejectionKind, Result, TextFragment,
    ValidationReport,
};

const PDF: &[u8] = b"%PDF-1.7\n1 0 obj<<>>endobj\n%%EOF";

fn pdf_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = PDF.to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

fn native(text: &str, page: u32) -> TextFragment {
    TextFragment {
        text: text.to_string(),
        page,
        bbox: [72.0, 100.0, 520.0, 112.0],
        char_start: 0,
        char_end: 0,
        extraction_method: ExtractionMethod::Native,
        chunk_type: ChunkType::Paragraph,
        confidence: None,
    }
}

/// Serves the same fragments for every document
struct FixedSource {
    fragments: Vec<TextFragment>,
}

impl FixedSource {
    fn announcement() -> Self {
        Self {
            fragments: vec![
                native("Aankondiging van een opdracht", 1),
                native("Aanbestedende dienst: Ministry of Digital Affairs", 1),
                native("Geraamde waarde: EUR 750.000", 2),
                native("Sluitingstermijn inschrijvingen: 2024-01-20", 2),
            ],
        }
    }

    fn empty() -> Self {
        Self {
            fragments: Vec::new(),
        }
    }
}

impl FragmentSource for FixedSource {
    fn native_fragments(&self, _path: &Path) -> Result<Vec<TextFragment>> {
        Ok(self.fragments.clone())
    }

    fn ocr_fragments(&self, _path: &Path) -> Result<Vec<TextFragment>> {
        Ok(Vec::new())
    }
}

/// Accepts anything with a PDF header
struct HeaderValidator;

impl DocumentValidator for HeaderValidator {
    fn validate(&self, path: &Path) -> Result<ValidationReport> {
        let data = std::fs::read(path)?;
        if data.starts_with(b"%PDF") {
            Ok(ValidationReport::ok(2))
        } else {
            Ok(ValidationReport::rejected(
                RejectionKind::InvalidType,
                "Invalid file type: text/plain",
            ))
        }
    }
}

#[derive(Default)]
struct ModelStats {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct MockModel {
    stats: Arc<ModelStats>,
    response: std::result::Result<FieldMap, ModelError>,
    delay: Duration,
}

impl MockModel {
    fn answering(response: std::result::Result<FieldMap, ModelError>) -> (Self, Arc<ModelStats>) {
        let stats = Arc::new(ModelStats::default());
        let model = Self {
            stats: Arc::clone(&stats),
            response,
            delay: Duration::ZERO,
        };
        (model, stats)
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ExtractionModel for MockModel {
    async fn extract(
        &self,
        _text: &str,
        _prompt: &str,
    ) -> std::result::Result<FieldMap, ModelError> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// A cache whose backing store is always down
struct UnreachableCache;

impl CacheStore for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Io(std::io::Error::other("connection refused")))
    }

    async fn set_with_ttl(&self, _key: &str, _value: String, _ttl: Duration) -> Result<bool> {
        Err(Error::Io(std::io::Error::other("connection refused")))
    }

    async fn invalidate(&self, _key: &str) -> Result<bool> {
        Err(Error::Io(std::io::Error::other("connection refused")))
    }
}

fn announcement_fields() -> FieldMap {
    FieldMap::new()
        .with("contracting_authority", "Ministry of Digital Affairs")
        .unwrap()
        .with("estimated_value", "EUR 750.000")
        .unwrap()
        .with("submission_deadline", "2024-01-20")
        .unwrap()
}

fn coordinator<C: CacheStore>(
    model: MockModel,
    cache: Option<C>,
    source: FixedSource,
    config: PipelineConfig,
) -> ExtractionCoordinator<MockModel, C> {
    ExtractionCoordinator::new(
        model,
        cache,
        Arc::new(source),
        Arc::new(HeaderValidator),
        config,
    )
}

fn memory_cache() -> Option<MemoryCache> {
    Some(MemoryCache::new(100, 10 * 1024 * 1024))
}

#[tokio::test]
async fn test_process_attributes_and_scores() {
    let (model, _) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );

    let result = coordinator
        .process(&pdf_bytes("a"), "Aankondiging_2024.pdf", "nl")
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(result.document_type, DocumentType::TenderAnnouncement);
    assert_eq!(result.fields.estimated_value, Some(750_000.0));
    assert_eq!(result.fields.currency.as_deref(), Some("EUR"));
    assert_eq!(
        result.fields.submission_deadline,
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap().and_hms_opt(0, 0, 0)
    );
    assert_eq!(result.page_count, Some(2));
    assert_eq!(result.fragment_count, 4);

    match &result.source_attribution["contracting_authority"] {
        AttributionEntry::Source(source) => {
            assert_eq!(source.page_number, 1);
            assert_eq!(source.fragment_index, 1);
            assert_eq!(source.source_filename, "Aankondiging_2024.pdf");
        }
        other => panic!("unexpected attribution {:?}", other),
    }

    // Only present fields are attributed
    for field in result.source_attribution.keys() {
        assert!(result.fields.is_present(field), "{} is not present", field);
    }
    assert!(result.completeness_score > 0.0 && result.completeness_score <= 1.0);
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );
    let bytes = pdf_bytes("cached");

    let first = coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();
    let second = coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();

    assert_eq!(stats.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);

    // A different language is a different cache entry
    coordinator.process(&bytes, "bestek.pdf", "en").await.unwrap();
    assert_eq!(stats.calls.load(Ordering::SeqCst), 2);

    let cache = coordinator.cache().unwrap();
    assert_eq!(cache.stats().entries, 2);
    assert_eq!(cache.stats().hits, 1);
}

#[tokio::test]
async fn test_invalidate_forces_reextraction() {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );
    let bytes = pdf_bytes("invalidate");

    coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();
    assert!(coordinator.invalidate(&bytes, "nl").await);
    assert!(!coordinator.invalidate(&bytes, "nl").await);
    coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();

    assert_eq!(stats.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unreachable_cache_degrades_to_uncached() {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        Some(UnreachableCache),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );
    let bytes = pdf_bytes("uncached");

    let result = coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();
    assert!(!result.is_error());
    coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();

    assert_eq!(stats.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disabled_cache_is_never_consulted() {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let config = PipelineConfig {
        enable_cache: false,
        ..Default::default()
    };
    let coordinator = coordinator(model, memory_cache(), FixedSource::announcement(), config);
    let bytes = pdf_bytes("disabled");

    coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();
    coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();

    assert!(coordinator.cache().is_none());
    assert_eq!(stats.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_model_failure_becomes_error_result() {
    let (model, _) = MockModel::answering(Err(ModelError::Unavailable(
        "connection reset".to_string(),
    )));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );
    let bytes = pdf_bytes("failing");

    let result = coordinator.process(&bytes, "bestek.pdf", "nl").await.unwrap();

    assert!(result.is_error());
    assert_eq!(result.document_type, DocumentType::Error);
    assert!(result.error_message().unwrap().contains("connection reset"));

    // Failures are not cached
    let key = cache_key(&tender_extract::source::content_hash(&bytes), "nl");
    let cache = coordinator.cache().unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_model_timeout_becomes_error_result() {
    let (model, _) = MockModel::answering(Ok(announcement_fields()));
    let model = model.with_delay(Duration::from_millis(500));
    let config = PipelineConfig {
        model_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let coordinator = coordinator(model, memory_cache(), FixedSource::announcement(), config);

    let result = coordinator
        .process(&pdf_bytes("slow"), "bestek.pdf", "nl")
        .await
        .unwrap();

    assert!(result.is_error());
    assert!(result.error_message().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_document_without_text_becomes_error_result() {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::empty(),
        PipelineConfig::default(),
    );

    let result = coordinator
        .process(&pdf_bytes("blank"), "scan.pdf", "nl")
        .await
        .unwrap();

    assert!(result.is_error());
    assert_eq!(stats.calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case::unsupported_language(pdf_bytes("x"), "es", "UnsupportedLanguage")]
#[case::empty_upload(Vec::new(), "nl", "EmptyDocument")]
#[case::not_a_pdf(b"Dit is geen PDF".to_vec(), "nl", "InvalidDocument")]
#[tokio::test]
async fn test_input_errors_are_rejected(
    #[case] content: Vec<u8>,
    #[case] language: &str,
    #[case] expected: &str,
) {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );

    let err = coordinator
        .process(&content, "upload.pdf", language)
        .await
        .unwrap_err();

    assert!(err.is_input_error());
    assert!(format!("{:?}", err).starts_with(expected), "{:?}", err);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_model_calls_respect_concurrency_limit() {
    let (model, stats) = MockModel::answering(Ok(announcement_fields()));
    let model = model.with_delay(Duration::from_millis(50));
    let config = PipelineConfig {
        max_concurrent_extractions: 2,
        ..Default::default()
    };
    let coordinator = coordinator(model, memory_cache(), FixedSource::announcement(), config);

    let files: Vec<DocumentInput> = (0..8)
        .map(|i| DocumentInput::new(format!("perceel_{}.pdf", i), pdf_bytes(&i.to_string())))
        .collect();

    let batch = coordinator
        .process_batch(&files, "nl", false, false)
        .await
        .unwrap();

    assert_eq!(batch.processed_count, 8);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 8);
    let max = stats.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 2, "{} concurrent model calls", max);
    assert!(max >= 1);
}

#[tokio::test]
async fn test_batch_keeps_submission_order_and_merges() {
    let (model, _) = MockModel::answering(Ok(announcement_fields()));
    let coordinator = coordinator(
        model,
        memory_cache(),
        FixedSource::announcement(),
        PipelineConfig::default(),
    );

    let files = vec![
        DocumentInput::new("aankondiging.pdf", pdf_bytes("1")),
        DocumentInput::new("notities.txt", b"geen pdf".to_vec()),
        DocumentInput::new("bijlage_1.pdf", pdf_bytes("2")),
    ];

    let batch = coordinator
        .process_batch(&files, "nl", true, true)
        .await
        .unwrap();

    let names: Vec<&str> = batch
        .documents
        .iter()
        .map(|o| match o {
            DocumentOutcome::Completed { filename, .. } => filename.as_str(),
            DocumentOutcome::Rejected { filename, .. } => filename.as_str(),
        })
        .collect();
    assert_eq!(names, vec!["aankondiging.pdf", "notities.txt", "bijlage_1.pdf"]);
    assert_eq!(batch.processed_count, 2);
    assert_eq!(batch.rejected_count, 1);

    let merged = batch.merged.unwrap();
    assert_eq!(merged.source_documents, vec!["aankondiging.pdf", "bijlage_1.pdf"]);
    assert_eq!(merged.contract_details.estimated_value, Some(750_000.0));
    assert_eq!(merged.document_relationships.len(), 1);
}

#[tokio::test]
async fn test_batch_size_limit() {
    let (model, _) = MockModel::answering(Ok(FieldMap::new()));
    let config = PipelineConfig {
        max_files_per_batch: 2,
        ..Default::default()
    };
    let coordinator = coordinator(model, memory_cache(), FixedSource::announcement(), config);

    let files: Vec<DocumentInput> = (0..3)
        .map(|i| DocumentInput::new(format!("{}.pdf", i), pdf_bytes(&i.to_string())))
        .collect();

    let err = coordinator
        .process_batch(&files, "nl", false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BatchTooLarge { count: 3, max: 2 }));
}

fn merged_input(
    filename: &str,
    value: Option<f64>,
    deadline: Option<(i32, u32, u32)>,
    price: Option<f64>,
) -> DocumentResult {
    let mut result = DocumentResult::error(filename, "nl", "");
    result.document_type = DocumentType::GeneralTenderDocument;
    result.source_attribution.clear();
    result.fields.estimated_value = value;
    result.fields.submission_deadline = deadline
        .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    if let Some(price) = price {
        result.fields.assessment_criteria.insert("price".to_string(), price);
    }
    result
}

#[test]
fn test_merge_selection_rules() {
    let a = merged_input("a.pdf", Some(500_000.0), Some((2024, 2, 15)), Some(0.4));
    let b = merged_input("b.pdf", Some(750_000.0), Some((2024, 1, 20)), Some(0.6));

    let merged = merge(&[a, b], true);

    assert_eq!(merged.contract_details.estimated_value, Some(750_000.0));
    assert_eq!(
        merged.contract_details.submission_deadline,
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap().and_hms_opt(0, 0, 0)
    );
    assert!((merged.evaluation_criteria.assessment_criteria["price"] - 0.5).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&merged.completeness_score));
}

#[test]
fn test_merge_of_nothing() {
    let merged = merge(&[], true);
    assert_eq!(merged.completeness_score, 0.0);
    assert!(merged.project_overview.cpv_codes.is_empty());
    assert!(merged.evaluation_criteria.assessment_criteria.is_empty());
    assert!(merged.document_relationships.is_empty());
}

#[test]
fn test_results_serialize_as_plain_records() {
    let result = tokio_test::block_on(async {
        let (model, _) = MockModel::answering(Ok(announcement_fields()));
        let coordinator = coordinator(
            model,
            None::<MemoryCache>,
            FixedSource::announcement(),
            PipelineConfig::default(),
        );
        coordinator
            .process(&pdf_bytes("json"), "aankondiging.pdf", "nl")
            .await
            .unwrap()
    });

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["document_type"], "tender_announcement");
    assert_eq!(json["contracting_authority"], "Ministry of Digital Affairs");
    assert_eq!(json["source_attribution"]["contracting_authority"]["page_number"], 1);
    assert!(json["confidence_scores"]["project_overview"].is_number());
}
