//! Native text layer extraction
//!
//! Characters are read from PDFium with their loose bounds, assembled into
//! words, ordered into lines and then split into table fragments (lines with
//! column gaps) and paragraph chunks (vertical-proximity grouping).

use super::{create_pdfium, map_pdfium_error};
use crate::config::LayoutConfig;
use crate::error::{Error, Result};
use crate::fragments::grouping::chunk_to_fragment;
use crate::fragments::{
    group_words, ChunkType, ExtractionMethod, GroupingRule, PositionedWord, TextFragment,
};
use pdfium_render::prelude::*;
use std::cmp::Ordering;
use std::path::Path;

/// Character with its box in top-left-origin page points
#[derive(Debug, Clone)]
pub struct CharBox {
    pub ch: char,
    pub x: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Extract native fragments for every page of the PDF at `path`.
pub fn extract_native(path: &Path, config: &LayoutConfig) -> Result<Vec<TextFragment>> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::PdfNotFound {
            path: path.display().to_string(),
        },
        _ => Error::Io(e),
    })?;

    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(&data, None)
        .map_err(map_pdfium_error)?;

    let mut fragments = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index as u32 + 1;
        let page_height = page.height().value as f64;

        let text = page.text().map_err(|e| Error::Pdfium {
            reason: format!("Failed to read text of page {}: {}", page_number, e),
        })?;

        let chars = collect_chars(&text, page_height);
        fragments.extend(page_fragments(&chars, page_number, config));
    }

    tracing::debug!(fragments = fragments.len(), "Native text layer extracted");
    Ok(fragments)
}

fn collect_chars(text: &PdfPageText, page_height: f64) -> Vec<CharBox> {
    let mut chars = Vec::new();

    for segment in text.segments().iter() {
        if let Ok(char_iter) = segment.chars() {
            for char_result in char_iter.iter() {
                if let Some(c) = char_result.unicode_char() {
                    if let Ok(bounds) = char_result.loose_bounds() {
                        chars.push(CharBox {
                            ch: c,
                            x: bounds.left().value as f64,
                            top: page_height - bounds.top().value as f64,
                            width: bounds.width().value as f64,
                            height: bounds.height().value as f64,
                        });
                    }
                }
            }
        }
    }

    chars
}

/// Turn one page's characters into table and paragraph fragments.
pub fn page_fragments(chars: &[CharBox], page: u32, config: &LayoutConfig) -> Vec<TextFragment> {
    let (y_tolerance, space_threshold) = dynamic_thresholds(chars);
    let words = assemble_words(chars, y_tolerance, space_threshold);
    let lines = order_into_lines(words, y_tolerance);

    let rule = GroupingRule {
        line_break_threshold: config.line_break_threshold,
        max_line_spread: None,
    };

    let mut fragments = Vec::new();
    let mut paragraph_words: Vec<PositionedWord> = Vec::new();

    for block in split_tables(&lines, config) {
        match block {
            Block::Table(rows) => {
                flush_paragraphs(&mut paragraph_words, &rule, page, &mut fragments);
                if let Some(table) = table_fragment(&rows, page) {
                    fragments.push(table);
                }
            }
            Block::Line(line) => paragraph_words.extend(line.iter().cloned()),
        }
    }
    flush_paragraphs(&mut paragraph_words, &rule, page, &mut fragments);

    fragments
}

/// Group buffered words into paragraph fragments, keeping reading order
/// relative to the tables around them.
fn flush_paragraphs(
    words: &mut Vec<PositionedWord>,
    rule: &GroupingRule,
    page: u32,
    fragments: &mut Vec<TextFragment>,
) {
    if words.is_empty() {
        return;
    }
    for chunk in group_words(words.as_slice(), rule) {
        if let Some(fragment) =
            chunk_to_fragment(&chunk, page, ExtractionMethod::Native, ChunkType::Paragraph)
        {
            fragments.push(fragment);
        }
    }
    words.clear();
}

/// Line tolerance and word-gap threshold from the median glyph height.
fn dynamic_thresholds(chars: &[CharBox]) -> (f64, f64) {
    let mut heights: Vec<f64> = chars
        .iter()
        .filter(|c| c.height > 0.0)
        .map(|c| c.height)
        .collect();

    if heights.is_empty() {
        return (2.0, 3.0);
    }

    heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let median_height = heights[heights.len() / 2];

    ((median_height * 0.4).max(2.0), (median_height * 0.3).max(1.5))
}

/// Build words from characters in content-stream order.
pub fn assemble_words(
    chars: &[CharBox],
    y_tolerance: f64,
    space_threshold: f64,
) -> Vec<PositionedWord> {
    let mut words = Vec::new();
    let mut current: Option<PositionedWord> = None;

    for c in chars {
        if c.ch.is_whitespace() {
            if let Some(word) = current.take() {
                words.push(word);
            }
            continue;
        }

        let continues = current.as_ref().is_some_and(|w| {
            let gap = c.x - w.x1;
            (c.top - w.top).abs() <= y_tolerance && gap <= space_threshold && gap > -space_threshold
        });

        if continues {
            if let Some(word) = current.as_mut() {
                word.text.push(c.ch);
                word.x1 = word.x1.max(c.x + c.width);
                word.top = word.top.min(c.top);
                word.bottom = word.bottom.max(c.top + c.height);
            }
        } else {
            if let Some(word) = current.take() {
                words.push(word);
            }
            current = Some(PositionedWord {
                text: c.ch.to_string(),
                x0: c.x,
                top: c.top,
                x1: c.x + c.width,
                bottom: c.top + c.height,
                confidence: None,
            });
        }
    }

    if let Some(word) = current {
        words.push(word);
    }

    words
}

/// Sort words top-to-bottom into lines, left-to-right within a line.
fn order_into_lines(mut words: Vec<PositionedWord>, y_tolerance: f64) -> Vec<Vec<PositionedWord>> {
    words.sort_by(|a, b| a.top.partial_cmp(&b.top).unwrap_or(Ordering::Equal));

    let mut lines: Vec<Vec<PositionedWord>> = Vec::new();
    let mut line_top = f64::NEG_INFINITY;

    for word in words {
        match lines.last_mut() {
            Some(line) if (word.top - line_top).abs() <= y_tolerance => line.push(word),
            _ => {
                line_top = word.top;
                lines.push(vec![word]);
            }
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x0.partial_cmp(&b.x0).unwrap_or(Ordering::Equal));
    }

    lines
}

enum Block<'a> {
    Table(Vec<Row<'a>>),
    Line(&'a [PositionedWord]),
}

/// Split a line into cells wherever the horizontal gap exceeds `column_gap`.
fn split_cells(line: &[PositionedWord], column_gap: f64) -> Vec<Vec<&PositionedWord>> {
    let mut cells: Vec<Vec<&PositionedWord>> = Vec::new();
    let mut prev_x1: Option<f64> = None;

    for word in line {
        let same_cell = prev_x1.is_some_and(|x1| word.x0 - x1 <= column_gap);
        match cells.last_mut() {
            Some(cell) if same_cell => cell.push(word),
            _ => cells.push(vec![word]),
        }
        prev_x1 = Some(word.x1);
    }

    cells
}

type Row<'a> = Vec<Vec<&'a PositionedWord>>;

fn flush_run<'a>(
    run: &mut Vec<(usize, Row<'a>)>,
    blocks: &mut Vec<Block<'a>>,
    lines: &'a [Vec<PositionedWord>],
    min_rows: usize,
) {
    if run.len() >= min_rows.max(1) {
        blocks.push(Block::Table(run.drain(..).map(|(_, cells)| cells).collect()));
    } else {
        for (index, _) in run.drain(..) {
            blocks.push(Block::Line(&lines[index]));
        }
    }
}

/// Runs of at least `min_table_rows` consecutive multi-cell lines become tables.
fn split_tables<'a>(lines: &'a [Vec<PositionedWord>], config: &LayoutConfig) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut run: Vec<(usize, Row<'a>)> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let cells = split_cells(line, config.table_column_gap);
        if cells.len() >= 2 {
            run.push((index, cells));
        } else {
            flush_run(&mut run, &mut blocks, lines, config.min_table_rows);
            blocks.push(Block::Line(line));
        }
    }
    flush_run(&mut run, &mut blocks, lines, config.min_table_rows);

    blocks
}

/// Flatten a table: cells joined with " | ", rows with newlines.
fn table_fragment(rows: &[Row<'_>], page: u32) -> Option<TextFragment> {
    let mut bbox = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    let mut lines = Vec::with_capacity(rows.len());

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                for w in cell {
                    bbox[0] = bbox[0].min(w.x0);
                    bbox[1] = bbox[1].min(w.top);
                    bbox[2] = bbox[2].max(w.x1);
                    bbox[3] = bbox[3].max(w.bottom);
                }
                cell.iter()
                    .map(|w| w.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        lines.push(cells.join(" | "));
    }

    if lines.is_empty() {
        return None;
    }

    Some(TextFragment {
        text: lines.join("\n"),
        page,
        bbox,
        char_start: 0,
        char_end: 0,
        extraction_method: ExtractionMethod::Native,
        chunk_type: ChunkType::Table,
        confidence: None,
    })
}
