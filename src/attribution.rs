//! Source attribution: mapping extracted values back to fragments
//!
//! Extracted values are usually paraphrased, so matching is by word overlap
//! rather than substring search.

use crate::extraction::{FieldMap, TenderFields, FIELD_NAMES};
use crate::fragments::TextFragment;
use crate::result::{AttributionEntry, SourceAttribution};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Minimum share of value tokens that must appear in a fragment
pub const MIN_OVERLAP: f64 = 0.3;

/// Attribution confidence for fragments without a recognition confidence
pub const NATIVE_CONFIDENCE: f64 = 0.85;

/// Where a fragment sits in the document
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentLocation {
    pub fragment_index: usize,
    pub page: u32,
    pub bbox: [f64; 4],
    pub char_start: usize,
    pub char_end: usize,
    pub confidence: Option<f64>,
}

/// Case-folded word set
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

struct IndexedFragment {
    tokens: HashSet<String>,
    location: FragmentLocation,
}

/// Fragment text to location map, in first-seen order.
///
/// A text that occurs more than once keeps its first location, so repeated
/// headers and footers attribute to where they first appear in reading order.
pub struct FragmentIndex {
    entries: Vec<IndexedFragment>,
}

impl FragmentIndex {
    pub fn new(fragments: &[TextFragment]) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(fragments.len());

        for (index, fragment) in fragments.iter().enumerate() {
            if !seen.insert(fragment.text.as_str()) {
                continue;
            }
            entries.push(IndexedFragment {
                tokens: tokenize(&fragment.text),
                location: FragmentLocation {
                    fragment_index: index,
                    page: fragment.page,
                    bbox: fragment.bbox,
                    char_start: fragment.char_start,
                    char_end: fragment.char_end,
                    confidence: fragment.confidence,
                },
            });
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-overlapping fragment for `value`, if its score exceeds
    /// [`MIN_OVERLAP`]. Ties go to the earlier fragment.
    pub fn best_match(&self, value: &str) -> Option<&FragmentLocation> {
        self.scored_match(value).map(|(_, location)| location)
    }

    fn scored_match(&self, value: &str) -> Option<(f64, &FragmentLocation)> {
        let value_tokens = tokenize(value);
        if value_tokens.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &FragmentLocation)> = None;
        for entry in &self.entries {
            let shared = value_tokens.intersection(&entry.tokens).count();
            let score = shared as f64 / value_tokens.len() as f64;
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, &entry.location));
            }
        }

        best.filter(|(score, _)| *score > MIN_OVERLAP)
    }
}

/// Attribute every present field to its best source fragment.
///
/// Matching uses the raw model strings, which stay closer to the source
/// wording than coerced values. When a field has several raw values the
/// highest-scoring match wins, ties going to the earlier value.
/// Fields without a match are left out.
pub fn attribute_fields(
    fields: &TenderFields,
    raw: &FieldMap,
    index: &FragmentIndex,
    source_filename: &str,
    timestamp: DateTime<Utc>,
) -> BTreeMap<String, AttributionEntry> {
    let mut attribution = BTreeMap::new();

    for &field in FIELD_NAMES {
        if !fields.is_present(field) {
            continue;
        }

        let mut matched: Option<(f64, &FragmentLocation)> = None;
        for value in raw.get(field) {
            if let Some((score, location)) = index.scored_match(value) {
                if matched.map_or(true, |(best, _)| score > best) {
                    matched = Some((score, location));
                }
            }
        }
        if let Some((_, location)) = matched {
            attribution.insert(
                field.to_string(),
                AttributionEntry::Source(SourceAttribution {
                    source_filename: source_filename.to_string(),
                    fragment_index: location.fragment_index,
                    page_number: location.page,
                    char_start: location.char_start,
                    char_end: location.char_end,
                    bbox: location.bbox,
                    confidence_score: location.confidence.unwrap_or(NATIVE_CONFIDENCE),
                    extraction_timestamp: timestamp,
                }),
            );
        }
    }

    attribution
}
