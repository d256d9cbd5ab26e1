//! Extraction model contract and field coercion
//!
//! The semantic extraction itself is delegated to an [`ExtractionModel`]:
//! full document text plus a language prompt in, a [`FieldMap`] of raw
//! strings out. [`fields::TenderFields::from_field_map`] turns that map into
//! typed fields through the parsers in [`parsers`].

pub mod fields;
pub mod http;
pub mod parsers;
pub mod prompts;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;

pub use fields::{Contact, Criterion, Deliverable, TenderFields};
pub use http::{HttpExtractionModel, ModelConfig};
pub use prompts::prompt_for_language;

/// Every field name a model may return
pub const FIELD_NAMES: &[&str] = &[
    "project_title",
    "project_description",
    "contracting_authority",
    "cpv_codes",
    "project_scope",
    "contract_type",
    "estimated_value",
    "currency",
    "contract_duration",
    "payment_terms",
    "publication_date",
    "question_deadline",
    "submission_deadline",
    "project_start_date",
    "knockout_criteria",
    "selection_criteria",
    "assessment_criteria",
    "contact_persons",
    "deliverables",
    "technical_requirements",
    "compliance_requirements",
];

pub fn is_known_field(name: &str) -> bool {
    FIELD_NAMES.contains(&name)
}

/// Failure of the extraction model call.
///
/// Distinct from an empty [`FieldMap`], which is a valid "nothing found".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("extraction model unavailable: {0}")]
    Unavailable(String),

    #[error("extraction model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed extraction model response: {0}")]
    Malformed(String),

    #[error("extraction model returned unknown field: {field}")]
    UnknownField { field: String },

    #[error("extraction model timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Raw model output: field name to every value reported for it, in order.
///
/// Repeated keys accumulate; nothing is overwritten here. Scalar/list
/// semantics are applied later during coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldMap {
    values: BTreeMap<String, Vec<String>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `field`. Unknown field names are rejected and
    /// blank values are ignored.
    pub fn push(&mut self, field: &str, value: impl Into<String>) -> Result<(), ModelError> {
        if !is_known_field(field) {
            return Err(ModelError::UnknownField {
                field: field.to_string(),
            });
        }
        let value = value.into();
        if value.trim().is_empty() {
            return Ok(());
        }
        self.values
            .entry(field.to_string())
            .or_default()
            .push(value.trim().to_string());
        Ok(())
    }

    /// Builder-style [`push`](Self::push) for known-good input
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Result<Self, ModelError> {
        self.push(field, value)?;
        Ok(self)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// Deserialized maps go through `push`, so unknown fields and blanks are
// handled the same as for model output.
impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut map = FieldMap::new();
        for (field, values) in raw {
            for value in values {
                map.push(&field, value).map_err(serde::de::Error::custom)?;
            }
        }
        Ok(map)
    }
}

/// Opaque semantic extraction capability.
///
/// Implementations must restrict output to [`FIELD_NAMES`] and signal failure
/// through `Err`, never through an empty map.
pub trait ExtractionModel: Send + Sync {
    fn extract(
        &self,
        text: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<FieldMap, ModelError>> + Send;
}
