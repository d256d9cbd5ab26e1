//! Vertical-proximity grouping of positioned words into chunks

use super::{ChunkType, ExtractionMethod, TextFragment};

/// A word with its box in page points (top-left origin)
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedWord {
    pub text: String,
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
    /// Recognition confidence in [0, 1]
    pub confidence: Option<f64>,
}

/// When to start a new chunk while scanning words in reading order
#[derive(Debug, Clone, Copy)]
pub struct GroupingRule {
    /// Break when a word's top differs from the chunk's mean top by more than this
    pub line_break_threshold: f64,
    /// Break when the chunk's vertical spread would exceed this
    pub max_line_spread: Option<f64>,
}

struct ChunkState<'a> {
    words: Vec<&'a PositionedWord>,
    top_sum: f64,
    min_top: f64,
    max_top: f64,
}

impl<'a> ChunkState<'a> {
    fn start(word: &'a PositionedWord) -> Self {
        Self {
            words: vec![word],
            top_sum: word.top,
            min_top: word.top,
            max_top: word.top,
        }
    }

    fn mean_top(&self) -> f64 {
        self.top_sum / self.words.len() as f64
    }

    fn accepts(&self, word: &PositionedWord, rule: &GroupingRule) -> bool {
        if (word.top - self.mean_top()).abs() > rule.line_break_threshold {
            return false;
        }
        match rule.max_line_spread {
            Some(limit) => self.max_top.max(word.top) - self.min_top.min(word.top) <= limit,
            None => true,
        }
    }

    fn push(&mut self, word: &'a PositionedWord) {
        self.top_sum += word.top;
        self.min_top = self.min_top.min(word.top);
        self.max_top = self.max_top.max(word.top);
        self.words.push(word);
    }
}

/// Split words (in reading order) into chunks.
pub fn group_words<'a>(
    words: &'a [PositionedWord],
    rule: &GroupingRule,
) -> Vec<Vec<&'a PositionedWord>> {
    let mut chunks = Vec::new();
    let mut current: Option<ChunkState<'a>> = None;

    for word in words {
        match current.as_mut() {
            Some(state) if state.accepts(word, rule) => state.push(word),
            _ => {
                if let Some(done) = current.take() {
                    chunks.push(done.words);
                }
                current = Some(ChunkState::start(word));
            }
        }
    }

    if let Some(done) = current {
        chunks.push(done.words);
    }

    chunks
}

/// Build a fragment from one chunk of words. Confidence is the mean of the
/// words' confidences when any word carries one.
pub fn chunk_to_fragment(
    words: &[&PositionedWord],
    page: u32,
    method: ExtractionMethod,
    chunk_type: ChunkType,
) -> Option<TextFragment> {
    let first = words.first()?;

    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut bbox = [first.x0, first.top, first.x1, first.bottom];
    for w in &words[1..] {
        bbox[0] = bbox[0].min(w.x0);
        bbox[1] = bbox[1].min(w.top);
        bbox[2] = bbox[2].max(w.x1);
        bbox[3] = bbox[3].max(w.bottom);
    }

    let confidences: Vec<f64> = words.iter().filter_map(|w| w.confidence).collect();
    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    Some(TextFragment {
        text,
        page,
        bbox,
        char_start: 0,
        char_end: 0,
        extraction_method: method,
        chunk_type,
        confidence,
    })
}
