//! Per-document extraction result

use crate::extraction::TenderFields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Key under which an extraction failure is recorded in `source_attribution`
pub const EXTRACTION_ERROR_KEY: &str = "extraction_error";

/// Document kind, inferred from the filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    TenderAnnouncement,
    TechnicalSpecifications,
    Annex,
    EvaluationCriteria,
    ContractTerms,
    Clarification,
    GeneralTenderDocument,
    /// Extraction failed; see `source_attribution["extraction_error"]`
    Error,
}

/// Provenance of one extracted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub source_filename: String,
    /// Position of the fragment in the normalized sequence
    pub fragment_index: usize,
    pub page_number: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub bbox: [f64; 4],
    pub confidence_score: f64,
    pub extraction_timestamp: DateTime<Utc>,
}

/// A `source_attribution` value: provenance, or the failure message under
/// [`EXTRACTION_ERROR_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributionEntry {
    Source(SourceAttribution),
    Error(String),
}

impl AttributionEntry {
    pub fn confidence(&self) -> Option<f64> {
        match self {
            AttributionEntry::Source(s) => Some(s.confidence_score),
            AttributionEntry::Error(_) => None,
        }
    }
}

/// Structured extraction of one document. Built once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: Uuid,
    pub filename: String,
    pub document_type: DocumentType,
    pub language: String,
    pub extraction_timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: TenderFields,
    pub source_attribution: BTreeMap<String, AttributionEntry>,
    pub completeness_score: f64,
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub fragment_count: usize,
}

impl DocumentResult {
    /// Terminal result for a document whose extraction failed.
    pub fn error(filename: &str, language: &str, message: impl Into<String>) -> Self {
        let mut source_attribution = BTreeMap::new();
        source_attribution.insert(
            EXTRACTION_ERROR_KEY.to_string(),
            AttributionEntry::Error(message.into()),
        );

        Self {
            document_id: Uuid::new_v4(),
            filename: filename.to_string(),
            document_type: DocumentType::Error,
            language: language.to_string(),
            extraction_timestamp: Utc::now(),
            fields: TenderFields::default(),
            source_attribution,
            completeness_score: 0.0,
            confidence_scores: BTreeMap::new(),
            page_count: None,
            fragment_count: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.document_type == DocumentType::Error
    }

    /// The recorded failure message, for error results
    pub fn error_message(&self) -> Option<&str> {
        match self.source_attribution.get(EXTRACTION_ERROR_KEY) {
            Some(AttributionEntry::Error(message)) => Some(message),
            _ => None,
        }
    }
}
