//! Completeness and confidence metrics for a single document

use crate::extraction::TenderFields;
use crate::fragments::{ExtractionMethod, TextFragment};
use std::collections::BTreeMap;

/// Base confidence when no OCR-derived fragment was used
pub const DEFAULT_BASE_CONFIDENCE: f64 = 0.9;

const CORE_FIELDS: &[&str] = &[
    "project_title",
    "contracting_authority",
    "estimated_value",
    "submission_deadline",
];

const SECONDARY_FIELDS: &[&str] = &[
    "project_description",
    "contract_type",
    "currency",
    "contract_duration",
    "publication_date",
    "question_deadline",
    "project_start_date",
];

const LIST_FIELDS: &[&str] = &["cpv_codes", "contact_persons", "assessment_criteria"];

/// Scoring categories and the fields that make them up
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "project_overview",
        &["project_title", "project_description", "contracting_authority"],
    ),
    (
        "contract_details",
        &["estimated_value", "contract_type", "currency"],
    ),
    (
        "critical_dates",
        &["publication_date", "submission_deadline", "question_deadline"],
    ),
    (
        "evaluation_criteria",
        &["knockout_criteria", "selection_criteria", "assessment_criteria"],
    ),
];

/// Weighted share of expected fields that are populated, in [0, 1].
///
/// Core fields weigh 2, secondary fields and list fields 1 each.
pub fn completeness(fields: &TenderFields) -> f64 {
    let weighted = CORE_FIELDS
        .iter()
        .map(|f| (f, 2.0))
        .chain(SECONDARY_FIELDS.iter().map(|f| (f, 1.0)))
        .chain(LIST_FIELDS.iter().map(|f| (f, 1.0)));

    let (filled, total) = weighted.fold((0.0, 0.0), |(filled, total), (field, weight)| {
        let gained = if fields.is_present(field) { weight } else { 0.0 };
        (filled + gained, total + weight)
    });

    filled / total
}

/// Mean recognition confidence of OCR fragments, or
/// [`DEFAULT_BASE_CONFIDENCE`] when none were used.
pub fn base_confidence(fragments: &[TextFragment]) -> f64 {
    let ocr: Vec<f64> = fragments
        .iter()
        .filter(|f| f.extraction_method == ExtractionMethod::Ocr)
        .filter_map(|f| f.confidence)
        .collect();

    if ocr.is_empty() {
        DEFAULT_BASE_CONFIDENCE
    } else {
        ocr.iter().sum::<f64>() / ocr.len() as f64
    }
}

/// Per-category confidence: base scaled by the share of the category's
/// fields present, capped at 1.0.
pub fn confidence_scores(fields: &TenderFields, base: f64) -> BTreeMap<String, f64> {
    CATEGORIES
        .iter()
        .map(|(category, members)| {
            let present = members.iter().filter(|f| fields.is_present(f)).count();
            let score = (base * present as f64 / members.len() as f64).min(1.0);
            (category.to_string(), score)
        })
        .collect()
}
