//! Fragment text cleaning and global character offsets

use super::{ChunkType, TextFragment};
use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static ANY_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// "Pagina 3", "page 3 of 12", "Pagina 3 van 12", "pagina 3/12" at the start
/// or end of a line. A page reference inside running text is content.
static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    let marker = r"\b(?:pagina|page|blz\.?)[ \t]*\d+(?:[ \t]*(?:van|of|/)[ \t]*\d+)?\b";
    Regex::new(&format!(r"(?im)^[ \t]*{m}|{m}[ \t]*$", m = marker)).unwrap()
});

/// A fragment that is nothing but a page number
static BARE_PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-?\s*\d{1,4}\s*-?\s*$").unwrap());

static ARTIFACTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s.,;:!?()\-€$£%&@#/|'"+]"#).unwrap());

static DUTCH_FIXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\baan\s+be\s*steding").unwrap(),
            "aanbesteding",
        ),
        (
            Regex::new(r"\b([Ii])\s+n\s+plaats\s+van\b").unwrap(),
            "${1}n plaats van",
        ),
        (
            Regex::new(r"(?i)\bin\s+schrijving\b").unwrap(),
            "inschrijving",
        ),
        (Regex::new(r"\bgunn\s+ing\b").unwrap(), "gunning"),
    ]
});

static ENGLISH_FIXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\btbe\b").unwrap(), "the"),
        (Regex::new(r"\bTbe\b").unwrap(), "The"),
    ]
});

fn language_fixes(language: &str) -> &'static [(Regex, &'static str)] {
    match language {
        "nl" => DUTCH_FIXES.as_slice(),
        "en" => ENGLISH_FIXES.as_slice(),
        _ => &[],
    }
}

fn collapse_whitespace(text: &str, keep_lines: bool) -> String {
    if keep_lines {
        text.lines()
            .map(|line| HORIZONTAL_WS.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        ANY_WS.replace_all(text, " ").trim().to_string()
    }
}

fn clean_once(text: &str, language: &str, keep_lines: bool) -> String {
    let mut text = text.replace('\u{FB01}', "fi").replace('\u{FB02}', "fl");

    text = collapse_whitespace(&text, keep_lines);
    text = PAGE_MARKER.replace_all(&text, "").into_owned();

    for (pattern, replacement) in language_fixes(language) {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    text = ARTIFACTS.replace_all(&text, "").into_owned();
    text = collapse_whitespace(&text, keep_lines);

    if BARE_PAGE_NUMBER.is_match(&text) {
        return String::new();
    }

    text
}

/// Clean one fragment's text.
///
/// Repeats the cleaning pass until the text stops changing, so cleaning
/// already-clean text is a no-op. Table text keeps its row breaks.
pub fn clean_text(text: &str, language: &str, chunk_type: ChunkType) -> String {
    let keep_lines = chunk_type == ChunkType::Table;
    let mut current = clean_once(text, language, keep_lines);

    // Every pass after the first only removes characters, so this terminates.
    loop {
        let next = clean_once(&current, language, keep_lines);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Clean fragments, drop the ones that end up too short and assign
/// document-wide character offsets (one character gap between fragments).
///
/// Fragments are ordered by page; order within a page is kept.
pub fn normalize_fragments(
    mut fragments: Vec<TextFragment>,
    language: &str,
    min_chars: usize,
) -> Vec<TextFragment> {
    fragments.sort_by_key(|f| f.page);

    let mut offset = 0usize;
    let mut normalized = Vec::with_capacity(fragments.len());

    for mut fragment in fragments {
        let cleaned = clean_text(&fragment.text, language, fragment.chunk_type);
        let len = cleaned.chars().count();
        if cleaned.is_empty() || len < min_chars {
            continue;
        }

        fragment.text = cleaned;
        fragment.char_start = offset;
        fragment.char_end = offset + len;
        offset = fragment.char_end + 1;
        normalized.push(fragment);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::test_support::fragment;
    use crate::fragments::ExtractionMethod::Native;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Aanbestedende   dienst:\n Gemeente  Utrecht", "Aanbestedende dienst: Gemeente Utrecht")]
    #[case("Europese aan be steding voor ICT", "Europese aanbesteding voor ICT")]
    #[case("Pagina 3 van 12 Inschrijvingstermijn", "Inschrijvingstermijn")]
    #[case("Inschrijvingstermijn page 7 of 9", "Inschrijvingstermijn")]
    #[case("zie pagina 3 van het bestek", "zie pagina 3 van het bestek")]
    #[case("zoals beschreven op blz. 12 van de leidraad", "zoals beschreven op blz. 12 van de leidraad")]
    #[case("Waarde € 250.000 «excl.» btw", "Waarde € 250.000 excl. btw")]
    #[case("Pro\u{FB01}el van de opdracht", "Profiel van de opdracht")]
    #[case("  17  ", "")]
    fn test_clean_text_dutch(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_text(input, "nl", ChunkType::Paragraph), expected);
    }

    #[test]
    fn test_language_specific_fixes() {
        assert_eq!(
            clean_text("tbe contracting authority", "en", ChunkType::Paragraph),
            "the contracting authority"
        );
        // Dutch fixes do not apply to English text
        assert_eq!(
            clean_text("aan be steding", "en", ChunkType::Paragraph),
            "aan be steding"
        );
    }

    #[test]
    fn test_table_keeps_rows() {
        let table = "Criterium  | Weging\nPrijs |  40%\n\nKwaliteit | 60%";
        assert_eq!(
            clean_text(table, "nl", ChunkType::Table),
            "Criterium | Weging\nPrijs | 40%\nKwaliteit | 60%"
        );
    }

    #[test]
    fn test_offsets_are_contiguous_with_gap() {
        let fragments = vec![
            fragment("Tweede pagina tekst", 2, Native),
            fragment("Eerste  pagina", 1, Native),
            fragment("ab", 1, Native),
            fragment("Pagina 4", 1, Native),
            fragment("Slot", 2, Native),
        ];

        let normalized = normalize_fragments(fragments, "nl", 3);
        let spans: Vec<(&str, usize, usize)> = normalized
            .iter()
            .map(|f| (f.text.as_str(), f.char_start, f.char_end))
            .collect();

        assert_eq!(
            spans,
            vec![
                ("Eerste pagina", 0, 13),
                ("Tweede pagina tekst", 14, 33),
                ("Slot", 34, 38),
            ]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let fragments = vec![
            fragment("Pagina 1  Opdrachtgever: Rijkswaterstaat", 1, Native),
            fragment("Sluitingsdatum  1 maart 2024 , 12:00 uur", 1, Native),
            fragment("   ", 2, Native),
            fragment("Bijlage ** 3", 2, Native),
        ];

        let once = normalize_fragments(fragments, "nl", 3);
        let twice = normalize_fragments(once.clone(), "nl", 3);
        assert_eq!(once, twice);
    }
}
