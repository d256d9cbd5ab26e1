//! Benchmarks for the CPU-bound pipeline stages
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tender_extract::attribution::FragmentIndex;
use tender_extract::fragments::{normalize_fragments, ChunkType, ExtractionMethod};
use tender_extract::{merge, DocumentResult, DocumentType, TextFragment};

const LINES: &[&str] = &[
    "Aanbestedende dienst: Gemeente   Utrecht",
    "Pagina 3 van 48",
    "De opdracht betreft het onderhoud van de openbare verlichting in de gemeente.",
    "Inschrijvers dienen te beschikken over een ISO 9001 certificaat.",
    "Geraamde waarde: € 1.250.000,00 excl. btw",
    "Sluitingstermijn: 15 maart 2024 om 12:00 uur",
    "De gunning geschiedt op basis van de beste prijs-kwaliteitverhouding.",
];

fn synthetic_fragments(pages: u32) -> Vec<TextFragment> {
    (1..=pages)
        .flat_map(|page| {
            LINES.iter().enumerate().map(move |(i, line)| {
                let top = 72.0 + i as f64 * 14.0;
                TextFragment {
                    text: format!("{} ({})", line, page),
                    page,
                    bbox: [72.0, top, 520.0, top + 11.0],
                    char_start: 0,
                    char_end: 0,
                    extraction_method: ExtractionMethod::Native,
                    chunk_type: ChunkType::Paragraph,
                    confidence: None,
                }
            })
        })
        .collect()
}

/// Benchmark normalization of document-sized fragment lists
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for pages in [1u32, 20, 100] {
        let fragments = synthetic_fragments(pages);
        group.throughput(Throughput::Elements(fragments.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pages), &fragments, |b, f| {
            b.iter(|| normalize_fragments(black_box(f.clone()), "nl", 3));
        });
    }

    group.finish();
}

/// Benchmark index construction and value matching
fn bench_attribution(c: &mut Criterion) {
    let fragments = normalize_fragments(synthetic_fragments(100), "nl", 3);

    c.bench_function("attribution_index_100_pages", |b| {
        b.iter(|| FragmentIndex::new(black_box(&fragments)));
    });

    let index = FragmentIndex::new(&fragments);
    c.bench_function("attribution_best_match", |b| {
        b.iter(|| index.best_match(black_box("onderhoud openbare verlichting gemeente")));
    });
}

/// Benchmark merging a full batch of results
fn bench_merge(c: &mut Criterion) {
    let results: Vec<DocumentResult> = (0..20)
        .map(|i| {
            let mut result = DocumentResult::error(&format!("perceel_{}.pdf", i), "nl", "");
            result.document_type = DocumentType::GeneralTenderDocument;
            result.source_attribution.clear();
            result.fields.estimated_value = Some(100_000.0 * f64::from(i + 1));
            result.fields.cpv_codes = vec![format!("4523{:04}-0", i % 5)];
            result
                .fields
                .assessment_criteria
                .insert("Prijs".to_string(), 0.3 + f64::from(i % 4) / 10.0);
            result
        })
        .collect();

    c.bench_function("merge_20_documents", |b| {
        b.iter(|| merge(black_box(&results), true));
    });
}

criterion_group!(benches, bench_normalize, bench_attribution, bench_merge);
criterion_main!(benches);
