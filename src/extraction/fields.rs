//! Typed tender fields and coercion from raw model output

use super::parsers::{parse_contact, parse_currency, parse_date, parse_weighted_criterion};
use super::FieldMap;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A knockout or selection requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Criterion {
    pub description: String,
    pub requirement: String,
}

impl Criterion {
    /// `"Omzet: minimaal EUR 1 miljoen"` splits at the first colon; text
    /// without one is both description and requirement.
    pub fn from_text(text: &str) -> Self {
        match text.split_once(':') {
            Some((head, tail)) if !head.trim().is_empty() && !tail.trim().is_empty() => Self {
                description: head.trim().to_string(),
                requirement: tail.trim().to_string(),
            },
            _ => Self {
                description: text.trim().to_string(),
                requirement: text.trim().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Deliverable {
    pub name: String,
    pub description: String,
}

impl Deliverable {
    pub fn from_text(text: &str) -> Self {
        let name = text
            .split_once(':')
            .map(|(head, _)| head.trim())
            .filter(|head| !head.is_empty())
            .unwrap_or_else(|| text.trim());
        Self {
            name: name.to_string(),
            description: text.trim().to_string(),
        }
    }
}

/// The semantic fields of one tender document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracting_authority: Option<String>,
    #[serde(default)]
    pub cpv_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_deadline: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_deadline: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_start_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub knockout_criteria: Vec<Criterion>,
    #[serde(default)]
    pub selection_criteria: Vec<Criterion>,
    #[serde(default)]
    pub assessment_criteria: BTreeMap<String, f64>,
    #[serde(default)]
    pub contact_persons: Vec<Contact>,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
    #[serde(default)]
    pub technical_requirements: Vec<String>,
    #[serde(default)]
    pub compliance_requirements: Vec<String>,
}

/// Repeated scalar reports keep the longest (most detailed) value.
fn longest(values: &[String]) -> Option<String> {
    values
        .iter()
        .fold(None::<&String>, |best, v| match best {
            Some(b) if b.chars().count() >= v.chars().count() => Some(b),
            _ => Some(v),
        })
        .cloned()
}

fn unique_strings(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn first_date(field: &str, values: &[String]) -> Option<NaiveDateTime> {
    let parsed = values.iter().find_map(|v| parse_date(v));
    if parsed.is_none() && !values.is_empty() {
        tracing::warn!(field, value = %values[0], "Could not parse date, omitting field");
    }
    parsed
}

impl TenderFields {
    /// Coerce raw model output into typed fields.
    ///
    /// Values that fail their parser are omitted and logged.
    pub fn from_field_map(map: &FieldMap) -> Self {
        let mut fields = TenderFields {
            project_title: longest(map.get("project_title")),
            project_description: longest(map.get("project_description")),
            contracting_authority: longest(map.get("contracting_authority")),
            cpv_codes: unique_strings(map.get("cpv_codes")),
            project_scope: longest(map.get("project_scope")),
            contract_type: longest(map.get("contract_type")),
            currency: longest(map.get("currency")).map(|c| c.to_uppercase()),
            contract_duration: longest(map.get("contract_duration")),
            payment_terms: longest(map.get("payment_terms")),
            publication_date: first_date("publication_date", map.get("publication_date")),
            question_deadline: first_date("question_deadline", map.get("question_deadline")),
            submission_deadline: first_date("submission_deadline", map.get("submission_deadline")),
            project_start_date: first_date("project_start_date", map.get("project_start_date")),
            knockout_criteria: unique_strings(map.get("knockout_criteria"))
                .iter()
                .map(|t| Criterion::from_text(t))
                .collect(),
            selection_criteria: unique_strings(map.get("selection_criteria"))
                .iter()
                .map(|t| Criterion::from_text(t))
                .collect(),
            deliverables: unique_strings(map.get("deliverables"))
                .iter()
                .map(|t| Deliverable::from_text(t))
                .collect(),
            technical_requirements: unique_strings(map.get("technical_requirements")),
            compliance_requirements: unique_strings(map.get("compliance_requirements")),
            ..Default::default()
        };

        for raw in map.get("estimated_value") {
            match parse_currency(raw) {
                Some(amount) => {
                    fields.estimated_value = Some(amount.value);
                    if fields.currency.is_none() {
                        fields.currency = amount.currency.map(str::to_string);
                    }
                    break;
                }
                None => tracing::warn!(value = %raw, "Could not parse estimated value"),
            }
        }

        for raw in map.get("assessment_criteria") {
            match parse_weighted_criterion(raw) {
                Some((name, weight)) => {
                    fields.assessment_criteria.insert(name, weight);
                }
                None => tracing::debug!(value = %raw, "Skipping unweighted assessment criterion"),
            }
        }

        for raw in map.get("contact_persons") {
            match parse_contact(raw) {
                Some(c) => {
                    let contact = Contact {
                        name: c.name,
                        role: c.role,
                        email: c.email,
                        phone: c.phone,
                    };
                    if !fields.contact_persons.contains(&contact) {
                        fields.contact_persons.push(contact);
                    }
                }
                None => tracing::warn!(value = %raw, "Could not parse contact"),
            }
        }

        fields
    }

    /// Whether the named field holds a non-empty value
    pub fn is_present(&self, field: &str) -> bool {
        match field {
            "project_title" => self.project_title.is_some(),
            "project_description" => self.project_description.is_some(),
            "contracting_authority" => self.contracting_authority.is_some(),
            "cpv_codes" => !self.cpv_codes.is_empty(),
            "project_scope" => self.project_scope.is_some(),
            "contract_type" => self.contract_type.is_some(),
            "estimated_value" => self.estimated_value.is_some(),
            "currency" => self.currency.is_some(),
            "contract_duration" => self.contract_duration.is_some(),
            "payment_terms" => self.payment_terms.is_some(),
            "publication_date" => self.publication_date.is_some(),
            "question_deadline" => self.question_deadline.is_some(),
            "submission_deadline" => self.submission_deadline.is_some(),
            "project_start_date" => self.project_start_date.is_some(),
            "knockout_criteria" => !self.knockout_criteria.is_empty(),
            "selection_criteria" => !self.selection_criteria.is_empty(),
            "assessment_criteria" => !self.assessment_criteria.is_empty(),
            "contact_persons" => !self.contact_persons.is_empty(),
            "deliverables" => !self.deliverables.is_empty(),
            "technical_requirements" => !self.technical_requirements.is_empty(),
            "compliance_requirements" => !self.compliance_requirements.is_empty(),
            _ => false,
        }
    }
}
