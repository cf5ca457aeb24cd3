//! Batch orchestration over real inputs: encoded buffers, files on disk,
//! raw bitmaps and multi-page documents.

use rust_barcode::decoder::linear::ean::check_digit;
use rust_barcode::synth::{self, Canvas, RenderOptions};
use rust_barcode::{
    BatchScanner, DocumentSource, ItemOutcome, PageBitmap, PageRenderer, ScanError, ScanOptions,
    Source, Symbology,
};
use std::sync::Arc;

/// A valid EAN-8 derived from `n`
fn ean8_text(n: usize) -> String {
    let data = format!("{:07}", (n * 7919 + 1_234_567) % 10_000_000);
    let digits: Vec<u8> = data.bytes().map(|b| b - b'0').collect();
    format!("{data}{}", check_digit(&digits))
}

fn ean8_canvas(text: &str) -> Canvas {
    let symbol = synth::encode(Symbology::Ean8, text).expect("valid EAN-8");
    synth::render(&symbol, RenderOptions::default())
}

fn options() -> ScanOptions {
    ScanOptions {
        max_parallel_threads: 4,
        ..ScanOptions::default()
    }
}

#[test]
fn test_hundred_items_with_one_empty_file() {
    let mut sources = Vec::new();
    let mut expected = Vec::new();
    for i in 0..100 {
        if i == 50 {
            sources.push(Source::Bytes(Vec::new()));
            expected.push(None);
            continue;
        }
        let text = ean8_text(i);
        let canvas = ean8_canvas(&text);
        let source = if i % 3 == 0 {
            Source::Bytes(canvas.to_png().expect("png encodes"))
        } else {
            canvas.into_bitmap(None).into()
        };
        sources.push(source);
        expected.push(Some(text));
    }

    let report = BatchScanner::new(options()).expect("pool").process_many(sources);
    assert_eq!(report.items.len(), 100);
    let indices: Vec<usize> = report.items.iter().map(|i| i.source.index).collect();
    assert_eq!(indices, (0..100).collect::<Vec<_>>());

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source.index, 50);
    assert!(matches!(
        failures[0].outcome,
        ItemOutcome::Failed(ScanError::CorruptInput(_))
    ));

    for (item, want) in report.items.iter().zip(&expected) {
        let Some(want) = want else { continue };
        let results = item.outcome.results();
        assert_eq!(results.len(), 1, "item {}: {:?}", item.source.index, item.outcome);
        assert_eq!(results[0].text(), want.as_str());
        assert_eq!(results[0].source_index(), item.source.index);
        assert!(results[0].confidence() >= 95);
    }
    assert_eq!(report.results().count(), 99);
}

#[test]
fn test_files_on_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let good = dir.path().join("label.png");
    std::fs::write(&good, ean8_canvas("96385074").to_png().expect("png encodes")).expect("write");
    let empty = dir.path().join("empty.png");
    std::fs::write(&empty, b"").expect("write");
    let text = dir.path().join("notes.txt");
    std::fs::write(&text, b"not an image at all").expect("write");
    let missing = dir.path().join("missing.png");

    let sources = vec![
        Source::Path(good.clone()),
        Source::Path(empty),
        Source::Path(text),
        Source::Path(missing),
    ];
    let report = BatchScanner::new(options()).expect("pool").process_many(sources);
    let outcomes: Vec<&ItemOutcome> = report.items.iter().map(|i| &i.outcome).collect();
    assert_eq!(outcomes[0].results()[0].text(), "96385074");
    assert_eq!(report.items[0].source.label, good.display().to_string());
    assert!(matches!(outcomes[1], ItemOutcome::Failed(ScanError::CorruptInput(_))));
    assert!(matches!(
        outcomes[2],
        ItemOutcome::Failed(ScanError::UnsupportedSourceKind(_))
    ));
    assert!(matches!(outcomes[3], ItemOutcome::Failed(ScanError::CorruptInput(_))));
}

/// A document whose page `n` carries the EAN-8 derived from `n`
struct Catalog {
    pages: usize,
}

impl PageRenderer for Catalog {
    fn document_id(&self) -> &str {
        "catalog.pdf"
    }

    fn page_count(&self) -> Result<usize, ScanError> {
        Ok(self.pages)
    }

    fn render_page(&self, page: usize, dpi: f32, _scale: f32) -> Result<PageBitmap, ScanError> {
        let mut bitmap = ean8_canvas(&ean8_text(page)).into_bitmap(Some(dpi));
        bitmap.page_index = page;
        Ok(bitmap)
    }
}

struct Unreadable;

impl PageRenderer for Unreadable {
    fn document_id(&self) -> &str {
        "locked.pdf"
    }

    fn page_count(&self) -> Result<usize, ScanError> {
        Err(ScanError::ItemProcessingError("password protected".to_string()))
    }

    fn render_page(&self, _page: usize, _dpi: f32, _scale: f32) -> Result<PageBitmap, ScanError> {
        Err(ScanError::ItemProcessingError("password protected".to_string()))
    }
}

#[test]
fn test_documents_expand_into_pages() {
    let catalog = Arc::new(Catalog { pages: 4 });
    let sources = vec![
        ean8_canvas("55123457").into_bitmap(None).into(),
        Source::Document(DocumentSource {
            renderer: catalog.clone(),
            pages: Some(vec![3, 0, 7]),
        }),
        Source::Document(DocumentSource {
            renderer: Arc::new(Unreadable),
            pages: None,
        }),
        Source::Document(DocumentSource {
            renderer: catalog,
            pages: None,
        }),
    ];
    let report = BatchScanner::new(options()).expect("pool").process_many(sources);

    let keys: Vec<(usize, Option<usize>)> = report
        .items
        .iter()
        .map(|i| (i.source.index, i.source.page))
        .collect();
    assert_eq!(
        keys,
        vec![
            (0, None),
            (1, Some(0)),
            (1, Some(3)),
            (2, None),
            (3, Some(0)),
            (3, Some(1)),
            (3, Some(2)),
            (3, Some(3)),
        ]
    );
    assert!(matches!(
        report.items[3].outcome,
        ItemOutcome::Failed(ScanError::ItemProcessingError(_))
    ));

    for item in report.items.iter().filter(|i| i.source.page.is_some()) {
        let page = item.source.page.unwrap_or_default();
        let results = item.outcome.results();
        assert_eq!(results.len(), 1, "{:?}", item.source);
        assert_eq!(results[0].text(), ean8_text(page));
        assert_eq!(results[0].page_index(), Some(page));
        assert_eq!(results[0].source_index(), item.source.index);
    }
    assert_eq!(report.results().count(), 7);
}

#[test]
fn test_separate_scanners_keep_their_own_options() {
    let qr = synth::render(
        &synth::encode(Symbology::QrCode, "OPTIONS").expect("fits"),
        RenderOptions::default(),
    );
    let linear_only = BatchScanner::new(ScanOptions {
        expect_barcode_types: Some(vec![Symbology::Ean8, Symbology::Code128]),
        ..options()
    })
    .expect("pool");
    let automatic = BatchScanner::new(options()).expect("pool");

    let sources = || vec![Source::from(qr.clone().into_bitmap(None))];
    let restricted = linear_only.process_many(sources());
    let open = automatic.process_many(sources());
    assert_eq!(restricted.items[0].outcome, ItemOutcome::NoBarcodeFound);
    assert_eq!(open.results().next().map(|r| r.text()), Some("OPTIONS"));
}
