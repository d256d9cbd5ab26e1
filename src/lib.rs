//! Tender document extraction
//!
//! Turns tender PDFs into structured, source-attributed records:
//! - [`fragments`]: positioned text from the native layer or OCR, reconciled
//!   per page and normalized
//! - [`extraction`]: the extraction model contract and typed field coercion
//! - [`attribution`]: mapping extracted values back to source fragments
//! - [`coordinator`]: the per-document pipeline with caching and a bounded
//!   number of concurrent model calls
//! - [`merge`]: consolidation of a batch into one tender record

pub mod attribution;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extraction;
pub mod fragments;
pub mod merge;
pub mod pdf;
pub mod result;
pub mod scoring;
pub mod source;

pub use config::{LayoutConfig, OcrConfig, PipelineConfig};
pub use coordinator::{BatchResult, DocumentInput, DocumentOutcome, ExtractionCoordinator};
pub use error::{Error, Result};
pub use extraction::{ExtractionModel, FieldMap, HttpExtractionModel, ModelConfig, ModelError};
pub use fragments::{FragmentSource, TextFragment};
pub use merge::{merge, merge_with, CrossReferenceDetector, MergedResult};
pub use pdf::{DocumentValidator, RejectionKind, ValidationReport};
pub use result::{AttributionEntry, DocumentResult, DocumentType, SourceAttribution};
pub use source::{CacheStore, MemoryCache};
