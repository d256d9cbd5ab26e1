//! Consolidation of per-document results into one tender record
//!
//! Merging is total: any list of results, including an empty one or one
//! made only of error results, yields a well-formed [`MergedResult`].

use crate::classify::has_annex_marker;
use crate::extraction::{Contact, Criterion, Deliverable};
use crate::result::{DocumentResult, DocumentType};
use crate::scoring::CATEGORIES;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub title: Option<String>,
    pub contracting_authority: Option<String>,
    pub cpv_codes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDetails {
    /// Highest value reported by any document
    pub estimated_value: Option<f64>,
    pub currency: Option<String>,
    /// Earliest deadline reported by any document
    pub submission_deadline: Option<NaiveDateTime>,
}

/// Earliest reported value per date field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalDates {
    pub publication_date: Option<NaiveDateTime>,
    pub question_deadline: Option<NaiveDateTime>,
    pub submission_deadline: Option<NaiveDateTime>,
    pub project_start_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    pub knockout_criteria: Vec<Criterion>,
    pub selection_criteria: Vec<Criterion>,
    /// Mean weight per criterion name across documents
    pub assessment_criteria: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliverablesAndRequirements {
    pub deliverables: Vec<Deliverable>,
    pub technical_requirements: Vec<String>,
    pub compliance_requirements: Vec<String>,
}

/// An inferred link between two documents of the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentRelationship {
    References { source: String, target: String },
    Annex { parent: String, child: String },
}

/// Tender-level view over a batch of document results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    pub tender_id: Uuid,
    pub extraction_timestamp: DateTime<Utc>,
    /// Documents that contributed, in input order
    pub source_documents: Vec<String>,
    pub project_overview: ProjectOverview,
    pub contract_details: ContractDetails,
    pub critical_dates: CriticalDates,
    pub evaluation_criteria: EvaluationCriteria,
    pub stakeholders: Vec<Contact>,
    pub deliverables_and_requirements: DeliverablesAndRequirements,
    pub document_relationships: Vec<DocumentRelationship>,
    pub completeness_score: f64,
    pub confidence_scores: BTreeMap<String, f64>,
}

/// Decides whether one document refers to another
pub trait CrossReferenceDetector {
    fn references(&self, from: &DocumentResult, to: &DocumentResult) -> bool;
}

/// Detector that never reports a reference
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCrossReferences;

impl CrossReferenceDetector for NoCrossReferences {
    fn references(&self, _from: &DocumentResult, _to: &DocumentResult) -> bool {
        false
    }
}

/// Merge results without cross-reference detection.
pub fn merge(results: &[DocumentResult], infer_relationships: bool) -> MergedResult {
    merge_with(results, infer_relationships, &NoCrossReferences)
}

/// Merge results, using `detector` for "references" edges.
///
/// Error-tagged results are skipped.
pub fn merge_with(
    results: &[DocumentResult],
    infer_relationships: bool,
    detector: &dyn CrossReferenceDetector,
) -> MergedResult {
    let docs: Vec<&DocumentResult> = results.iter().filter(|r| !r.is_error()).collect();

    let project_overview = ProjectOverview {
        title: first_present(&docs, |d| d.fields.project_title.as_ref()),
        contracting_authority: first_present(&docs, |d| d.fields.contracting_authority.as_ref()),
        cpv_codes: dedup(docs.iter().flat_map(|d| d.fields.cpv_codes.iter().cloned())),
    };

    let contract_details = ContractDetails {
        estimated_value: docs
            .iter()
            .filter_map(|d| d.fields.estimated_value)
            .reduce(f64::max),
        currency: first_present(&docs, |d| d.fields.currency.as_ref()),
        submission_deadline: earliest(&docs, |d| d.fields.submission_deadline),
    };

    let critical_dates = CriticalDates {
        publication_date: earliest(&docs, |d| d.fields.publication_date),
        question_deadline: earliest(&docs, |d| d.fields.question_deadline),
        submission_deadline: contract_details.submission_deadline,
        project_start_date: earliest(&docs, |d| d.fields.project_start_date),
    };

    let evaluation_criteria = EvaluationCriteria {
        knockout_criteria: dedup(
            docs.iter()
                .flat_map(|d| d.fields.knockout_criteria.iter().cloned()),
        ),
        selection_criteria: dedup(
            docs.iter()
                .flat_map(|d| d.fields.selection_criteria.iter().cloned()),
        ),
        assessment_criteria: mean_weights(&docs),
    };

    let deliverables_and_requirements = DeliverablesAndRequirements {
        deliverables: dedup(docs.iter().flat_map(|d| d.fields.deliverables.iter().cloned())),
        technical_requirements: dedup(
            docs.iter()
                .flat_map(|d| d.fields.technical_requirements.iter().cloned()),
        ),
        compliance_requirements: dedup(
            docs.iter()
                .flat_map(|d| d.fields.compliance_requirements.iter().cloned()),
        ),
    };

    let document_relationships = if infer_relationships {
        relationships(&docs, detector)
    } else {
        Vec::new()
    };

    let mut merged = MergedResult {
        tender_id: Uuid::new_v4(),
        extraction_timestamp: Utc::now(),
        source_documents: docs.iter().map(|d| d.filename.clone()).collect(),
        project_overview,
        contract_details,
        critical_dates,
        evaluation_criteria,
        stakeholders: dedup(docs.iter().flat_map(|d| d.fields.contact_persons.iter().cloned())),
        deliverables_and_requirements,
        document_relationships,
        completeness_score: 0.0,
        confidence_scores: category_confidence(&docs),
    };
    merged.completeness_score = merged_completeness(&merged);

    tracing::debug!(
        documents = docs.len(),
        skipped = results.len() - docs.len(),
        completeness = merged.completeness_score,
        "Merged document results"
    );

    merged
}

fn first_present<F>(docs: &[&DocumentResult], field: F) -> Option<String>
where
    F: Fn(&DocumentResult) -> Option<&String>,
{
    docs.iter()
        .filter_map(|&d| field(d))
        .find(|v| !v.trim().is_empty())
        .cloned()
}

fn earliest<F>(docs: &[&DocumentResult], field: F) -> Option<NaiveDateTime>
where
    F: Fn(&DocumentResult) -> Option<NaiveDateTime>,
{
    docs.iter().filter_map(|&d| field(d)).min()
}

/// Structural deduplication, keeping first occurrences in order
fn dedup<T, I>(items: I) -> Vec<T>
where
    T: Clone + Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn mean_weights(docs: &[&DocumentResult]) -> BTreeMap<String, f64> {
    let mut reported: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for doc in docs {
        for (name, weight) in &doc.fields.assessment_criteria {
            reported.entry(name.as_str()).or_default().push(*weight);
        }
    }

    reported
        .into_iter()
        .map(|(name, weights)| {
            let mean = weights.iter().sum::<f64>() / weights.len() as f64;
            (name.to_string(), mean)
        })
        .collect()
}

fn is_annex(doc: &DocumentResult) -> bool {
    doc.document_type == DocumentType::Annex && has_annex_marker(&doc.filename)
}

fn relationships(
    docs: &[&DocumentResult],
    detector: &dyn CrossReferenceDetector,
) -> Vec<DocumentRelationship> {
    let mut edges = Vec::new();

    for (i, first) in docs.iter().enumerate() {
        for second in &docs[i + 1..] {
            if detector.references(first, second) {
                edges.push(DocumentRelationship::References {
                    source: first.filename.clone(),
                    target: second.filename.clone(),
                });
            }

            let annex = if is_annex(second) {
                Some((first, second))
            } else if is_annex(first) {
                Some((second, first))
            } else {
                None
            };
            if let Some((parent, child)) = annex {
                edges.push(DocumentRelationship::Annex {
                    parent: parent.filename.clone(),
                    child: child.filename.clone(),
                });
            }
        }
    }

    edges
}

/// Share of the five headline facts the merged record holds
fn merged_completeness(merged: &MergedResult) -> f64 {
    let checklist = [
        merged.project_overview.title.is_some(),
        merged.project_overview.contracting_authority.is_some(),
        merged.contract_details.estimated_value.is_some(),
        merged.contract_details.submission_deadline.is_some(),
        !merged.evaluation_criteria.assessment_criteria.is_empty(),
    ];
    checklist.iter().filter(|present| **present).count() as f64 / checklist.len() as f64
}

/// Mean attribution confidence per category, pooled over all documents.
/// Categories without any attributed field are left out.
fn category_confidence(docs: &[&DocumentResult]) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();

    for (category, members) in CATEGORIES {
        let pooled: Vec<f64> = docs
            .iter()
            .flat_map(|d| {
                members
                    .iter()
                    .filter_map(|field| d.source_attribution.get(*field))
                    .filter_map(|entry| entry.confidence())
            })
            .collect();

        if !pooled.is_empty() {
            let mean = pooled.iter().sum::<f64>() / pooled.len() as f64;
            scores.insert(category.to_string(), mean);
        }
    }

    scores
}
