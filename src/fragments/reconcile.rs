//! Per-page choice between native and OCR fragments

use super::TextFragment;
use std::collections::BTreeMap;

/// OCR runs when the native layer produced nothing or when it is forced.
pub fn should_run_ocr(native: &[TextFragment], force: bool) -> bool {
    force || native.is_empty()
}

fn by_page(fragments: Vec<TextFragment>) -> BTreeMap<u32, Vec<TextFragment>> {
    let mut pages: BTreeMap<u32, Vec<TextFragment>> = BTreeMap::new();
    for fragment in fragments {
        pages.entry(fragment.page).or_default().push(fragment);
    }
    pages
}

fn char_count(fragments: &[TextFragment]) -> usize {
    fragments.iter().map(TextFragment::char_len).sum()
}

/// Merge native and OCR fragments into one page-ordered list.
///
/// A page takes its OCR fragments only when its native text is shorter than
/// `min_page_chars` and OCR recovered more characters than the native layer.
/// Chunk order within a page is preserved.
pub fn reconcile_pages(
    native: Vec<TextFragment>,
    ocr: Vec<TextFragment>,
    min_page_chars: usize,
) -> Vec<TextFragment> {
    let mut native_pages = by_page(native);
    let mut ocr_pages = by_page(ocr);

    let mut page_numbers: Vec<u32> = native_pages
        .keys()
        .chain(ocr_pages.keys())
        .copied()
        .collect();
    page_numbers.sort_unstable();
    page_numbers.dedup();

    let mut merged = Vec::new();
    for page in page_numbers {
        let native_page = native_pages.remove(&page).unwrap_or_default();
        let ocr_page = ocr_pages.remove(&page).unwrap_or_default();

        let native_chars = char_count(&native_page);
        let ocr_chars = char_count(&ocr_page);

        if native_chars < min_page_chars && ocr_chars > native_chars {
            tracing::debug!(page, native_chars, ocr_chars, "Using OCR text for page");
            merged.extend(ocr_page);
        } else {
            merged.extend(native_page);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::test_support::fragment;
    use crate::fragments::ExtractionMethod::{Native, Ocr};

    fn long_text() -> String {
        "Dit is een uitgebreide beschrijving van de opdracht die ruim boven de drempel uitkomt voor een digitale pagina.".to_string()
    }

    #[test]
    fn test_dense_native_pages_keep_native() {
        let native = vec![
            fragment(&long_text(), 1, Native),
            fragment(&long_text(), 2, Native),
        ];
        let ocr = vec![
            fragment(&(long_text() + " extra"), 1, Ocr),
            fragment(&(long_text() + " extra"), 2, Ocr),
        ];

        let merged = reconcile_pages(native, ocr, 100);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|f| f.extraction_method == Native));
    }

    #[test]
    fn test_scanned_insert_page_uses_ocr() {
        let native = vec![
            fragment(&long_text(), 1, Native),
            fragment(&long_text(), 3, Native),
        ];
        let ocr = vec![
            fragment("Gescande bijlage met handtekening", 2, Ocr),
            fragment(&long_text(), 3, Ocr),
        ];

        let merged = reconcile_pages(native, ocr, 100);
        let methods: Vec<(u32, _)> = merged
            .iter()
            .map(|f| (f.page, f.extraction_method))
            .collect();
        assert_eq!(methods, vec![(1, Native), (2, Ocr), (3, Native)]);
    }

    #[test]
    fn test_sparse_page_keeps_native_when_ocr_is_shorter() {
        let native = vec![fragment("Bijlage A - tekening", 1, Native)];
        let ocr = vec![fragment("Bijlage", 1, Ocr)];

        let merged = reconcile_pages(native, ocr, 100);
        assert_eq!(merged[0].extraction_method, Native);
    }

    #[test]
    fn test_should_run_ocr() {
        assert!(should_run_ocr(&[], false));
        assert!(should_run_ocr(&[fragment("x", 1, Native)], true));
        assert!(!should_run_ocr(&[fragment("x", 1, Native)], false));
    }
}
