//! Performance benchmarks for the render and export pipelines
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_highlight_server::annotation::StaticAnnotationOverlay;
use pdf_highlight_server::export::export_document;
use pdf_highlight_server::geometry::{PageSize, Viewport};
use pdf_highlight_server::highlight::{match_keywords, HighlightStyle};
use pdf_highlight_server::pdf::memory::{MemoryAssembler, MemoryDocument};
use pdf_highlight_server::text::PositionedTextItem;
use pdf_highlight_server::{HighlightConfig, RenderSession};

/// A document of `pages` A4 pages, each with a grid of short text items
fn synthetic_document(pages: usize) -> MemoryDocument {
    let words = ["回線", "説明", "梅雨", "季節", "役目", "text"];
    let mut builder = MemoryDocument::builder();
    for _ in 0..pages {
        builder = builder.page(|mut p| {
            for row in 0..40 {
                for col in 0..8 {
                    let word = words[(row + col) % words.len()];
                    p = p.text(word, 40.0 + col as f64 * 65.0, 800.0 - row as f64 * 19.0);
                }
            }
            p
        });
    }
    builder.build()
}

fn session<'d>(doc: &'d MemoryDocument, config: &HighlightConfig) -> RenderSession<'d, MemoryDocument> {
    let annotations = StaticAnnotationOverlay::with_font(config.annotations.clone(), None);
    RenderSession::with_annotations(doc, config, annotations).unwrap()
}

/// Benchmark keyword matching over one page of text items
fn bench_keyword_matching(c: &mut Criterion) {
    let config = HighlightConfig::default();
    let keywords = config.keyword_set().unwrap();
    let viewport = Viewport::new(PageSize::new(595.0, 842.0), config.scale).unwrap();
    let items: Vec<PositionedTextItem> = (0..320)
        .map(|i| PositionedTextItem::at(format!("項目{}梅", i), 40.0, i as f64 * 2.0, 20.0, 10.0))
        .collect();

    let mut group = c.benchmark_group("keyword_matching");
    group.throughput(Throughput::Elements(items.len() as u64));
    group.bench_function("320_items", |b| {
        b.iter(|| {
            match_keywords(
                black_box(&items),
                &viewport,
                &keywords,
                HighlightStyle::default(),
            )
        });
    });
    group.finish();
}

/// Benchmark a full page render at different scales
fn bench_render_page(c: &mut Criterion) {
    let doc = synthetic_document(1);

    let mut group = c.benchmark_group("render_page");
    for scale in [1.0, 2.0, 3.0] {
        let config = HighlightConfig {
            scale,
            ..HighlightConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(scale), &config, |b, config| {
            let mut session = session(&doc, config);
            b.iter(|| {
                session.render_page(black_box(1)).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark exporting whole documents
fn bench_export(c: &mut Criterion) {
    let config = HighlightConfig {
        scale: 1.0,
        ..HighlightConfig::default()
    };

    let mut group = c.benchmark_group("export");
    group.sample_size(10);
    for pages in [1, 4] {
        let doc = synthetic_document(pages);
        group.throughput(Throughput::Elements(pages as u64));
        group.bench_with_input(BenchmarkId::new("pages", pages), &doc, |b, doc| {
            b.iter(|| {
                let mut session = session(doc, &config);
                export_document(&mut session, |orientation, first| {
                    Ok(MemoryAssembler::new(orientation, first))
                })
                .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_keyword_matching, bench_render_page, bench_export);
criterion_main!(benches);
