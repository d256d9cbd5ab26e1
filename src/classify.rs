//! Filename-based document classification

use crate::result::DocumentType;

/// Filename markers identifying an annex
pub const ANNEX_MARKERS: &[&str] = &["bijlage", "annex"];

const RULES: &[(&[&str], DocumentType)] = &[
    (&["aankondiging", "announcement"], DocumentType::TenderAnnouncement),
    (&["bestek", "specifications"], DocumentType::TechnicalSpecifications),
    (ANNEX_MARKERS, DocumentType::Annex),
    (&["criteria", "gunning", "award"], DocumentType::EvaluationCriteria),
    (&["contract", "overeenkomst"], DocumentType::ContractTerms),
    (&["vraag", "question", "clarification"], DocumentType::Clarification),
];

/// Classify by the first matching marker group, case-insensitively.
pub fn classify_document(filename: &str) -> DocumentType {
    let name = filename.to_lowercase();
    RULES
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| name.contains(m)))
        .map(|(_, kind)| *kind)
        .unwrap_or(DocumentType::GeneralTenderDocument)
}

pub fn has_annex_marker(filename: &str) -> bool {
    let name = filename.to_lowercase();
    ANNEX_MARKERS.iter().any(|m| name.contains(m))
}
