//! End-to-end scenarios on synthesized images: retail code at print
//! resolution, damaged QR symbols, several symbols per image, noise, crops,
//! rotations and resolution changes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_barcode::decoder::qr::tables::EcLevel;
use rust_barcode::synth::{self, Canvas, QrOptions, RenderOptions, Symbol};
use rust_barcode::{
    ItemOutcome, QualityNote, ReadingSpeed, ReconstructionPath, Rect, ScanOptions, Scanner,
    Source, Symbology, process_many,
};

const QR_MODULE_PX: usize = 4;
const QR_QUIET_PX: usize = 10 * QR_MODULE_PX;

fn render(symbology: Symbology, text: &str, module_px: usize) -> Canvas {
    let symbol = synth::encode(symbology, text).expect("encodable");
    synth::render(
        &symbol,
        RenderOptions {
            module_px,
            ..RenderOptions::default()
        },
    )
}

/// Version 2 at level H: 28 check codewords, one block
fn qr_h() -> (Canvas, usize) {
    let options = QrOptions {
        ec_level: EcLevel::H,
        min_version: 2,
        mask: None,
    };
    let symbol = synth::encode_qr("012345678905", options).expect("fits");
    let side = symbol.modules.width() * QR_MODULE_PX;
    let canvas = synth::render(
        &Symbol::Matrix(symbol.modules),
        RenderOptions {
            module_px: QR_MODULE_PX,
            ..RenderOptions::default()
        },
    );
    (canvas, side)
}

/// Black out the bottom-right corner over `fraction` of the symbol's area
fn blot_corner(canvas: &mut Canvas, symbol_side: usize, fraction: f32) {
    let blot = ((fraction.sqrt() * symbol_side as f32).round() as usize).min(symbol_side);
    if blot == 0 {
        return;
    }
    let far = QR_QUIET_PX + symbol_side;
    canvas.fill_rect(Rect::new(far - blot, far - blot, blot, blot), 0);
}

/// Draw a full-height vertical line of `value` across the canvas
fn scratch(canvas: &Canvas, x: usize, width: usize, value: u8) -> Canvas {
    let mut scratched = canvas.clone();
    scratched.fill_rect(Rect::new(x, 0, width, canvas.height()), value);
    scratched
}

fn scan(canvas: Canvas, options: ScanOptions) -> ItemOutcome {
    Scanner::new(options).scan(canvas.into_bitmap(Some(300.0)))
}

#[test]
fn test_upc_a_at_print_resolution() {
    // 4 px per module at 300 dpi is a 0.34 mm module
    let canvas = render(Symbology::UpcA, "012345678905", 4);
    let outcome = scan(canvas, ScanOptions::default());
    let results = outcome.results();
    assert_eq!(results.len(), 1, "{outcome:?}");
    assert_eq!(results[0].text(), "012345678905");
    assert_eq!(results[0].symbology(), Symbology::UpcA);
    assert!(results[0].confidence() >= 95);
    assert_eq!(results[0].reconstruction_path(), ReconstructionPath::None);
}

#[test]
fn test_qr_h_with_blotted_corner_is_ecc_corrected() {
    let (mut canvas, side) = qr_h();
    blot_corner(&mut canvas, side, 0.2);
    let outcome = scan(canvas, ScanOptions::default());
    let results = outcome.results();
    assert_eq!(results.len(), 1, "{outcome:?}");
    let r = &results[0];
    assert_eq!(r.text(), "012345678905");
    assert_eq!(r.symbology(), Symbology::QrCode);
    assert_eq!(r.reconstruction_path(), ReconstructionPath::EccCorrected);
    assert!((70..=94).contains(&r.confidence()), "{}", r.confidence());
}

#[test]
fn test_error_correction_runs_at_every_speed() {
    for speed in [ReadingSpeed::Faster, ReadingSpeed::Balanced, ReadingSpeed::Detailed] {
        let (mut canvas, side) = qr_h();
        blot_corner(&mut canvas, side, 0.2);
        let options = ScanOptions {
            reading_speed: speed,
            ..ScanOptions::default()
        };
        let outcome = scan(canvas, options);
        let r = outcome.results().first().unwrap_or_else(|| panic!("{speed:?}: {outcome:?}"));
        assert_eq!(r.text(), "012345678905");
        assert!((70..=94).contains(&r.confidence()), "{speed:?}: {}", r.confidence());
    }
}

#[test]
fn test_confidence_never_rises_with_damage() {
    let mut previous = u8::MAX;
    for fraction in [0.0f32, 0.05, 0.1, 0.15, 0.2] {
        let (mut canvas, side) = qr_h();
        blot_corner(&mut canvas, side, fraction);
        let outcome = scan(canvas, ScanOptions::default());
        let confidence = match outcome.results().first() {
            Some(r) => {
                assert_eq!(r.text(), "012345678905");
                r.confidence()
            }
            None => 0,
        };
        assert!(
            confidence <= previous,
            "{fraction}: {confidence} after {previous}"
        );
        if fraction == 0.0 {
            assert!(confidence >= 95);
        }
        previous = confidence;
    }
}

#[test]
fn test_scratched_retail_codes_read_right_or_not_at_all() {
    let symbols = [
        (Symbology::UpcA, "012345678905"),
        (Symbology::Ean13, "4006381333931"),
    ];
    for (symbology, text) in symbols {
        let canvas = render(symbology, text, 3);
        let mut read = 0;
        let mut tried = 0;
        for value in [0u8, 255] {
            for x in (24..canvas.width() - 24).step_by(2) {
                let outcome = scan(scratch(&canvas, x, 3, value), ScanOptions::default());
                tried += 1;
                if let Some(r) = outcome.results().first() {
                    assert_eq!(r.text(), text, "{symbology:?} scratched at {x} with {value}");
                    read += 1;
                }
            }
        }
        // most scratches miss the elements that matter
        assert!(3 * read >= tried, "{symbology:?}: {read} of {tried}");
    }
}

#[test]
fn test_worn_digit_is_statistically_reconstructed() {
    // each scratch leaves one digit far from every pattern, the check digit fixes it
    let canvas = render(Symbology::UpcA, "012345678905", 3);
    let scratches = [(101, 0u8), (143, 0), (199, 0), (262, 0), (58, 255), (79, 255), (221, 255)];
    let mut reconstructed = 0;
    for (x, value) in scratches {
        let outcome = scan(scratch(&canvas, x, 3, value), ScanOptions::default());
        let Some(r) = outcome.results().first() else {
            continue;
        };
        assert_eq!(r.text(), "012345678905", "scratch at {x}");
        if r.reconstruction_path() == ReconstructionPath::StatisticallyReconstructed {
            assert!((30..=69).contains(&r.confidence()), "{x}: {}", r.confidence());
            reconstructed += 1;
        }
    }
    assert!(reconstructed > 0);

    // the statistical pass is what made the read
    let faster = ScanOptions {
        reading_speed: ReadingSpeed::Faster,
        ..ScanOptions::default()
    };
    for (x, value) in scratches {
        let outcome = scan(scratch(&canvas, x, 3, value), faster.clone());
        if let Some(r) = outcome.results().first() {
            assert_ne!(r.reconstruction_path(), ReconstructionPath::StatisticallyReconstructed);
        }
    }
}

#[test]
fn test_several_symbols_in_one_image() {
    let parts = [
        (render(Symbology::UpcA, "036000291452", 3), "036000291452"),
        (render(Symbology::QrCode, "HELLO WORLD", 4), "HELLO WORLD"),
        (render(Symbology::Code128, "Lot 42", 3), "Lot 42"),
    ];
    let gap = 100;
    let width = parts.iter().map(|(c, _)| c.width()).sum::<usize>() + gap * (parts.len() + 1);
    let height = parts.iter().map(|(c, _)| c.height()).max().unwrap_or(0) + 2 * gap;
    let mut canvas = Canvas::new(width, height);
    let mut x = gap;
    for (part, _) in &parts {
        canvas.blit(part, x, gap);
        x += part.width() + gap;
    }

    let options = ScanOptions {
        expect_multiple_barcodes: true,
        ..ScanOptions::default()
    };
    let outcome = scan(canvas, options);
    let results = outcome.results();
    assert_eq!(results.len(), parts.len(), "{outcome:?}");
    let mut texts: Vec<&str> = results.iter().map(|r| r.text()).collect();
    texts.sort_unstable();
    let mut expected: Vec<&str> = parts.iter().map(|(_, t)| *t).collect();
    expected.sort_unstable();
    assert_eq!(texts, expected);
    assert!(results.windows(2).all(|w| w[0].confidence() >= w[1].confidence()));
    for (i, a) in results.iter().enumerate() {
        for b in &results[i + 1..] {
            assert!(a.bounds().overlap_ratio(&b.bounds()) <= 0.3);
        }
    }
}

#[test]
fn test_single_mode_stops_at_first_symbol() {
    let a = render(Symbology::Ean8, "96385074", 3);
    let b = render(Symbology::Ean8, "55123457", 3);
    let mut canvas = Canvas::new(a.width() + b.width() + 300, a.height() + 200);
    canvas.blit(&a, 100, 100);
    canvas.blit(&b, a.width() + 200, 100);
    assert_eq!(scan(canvas, ScanOptions::default()).results().len(), 1);
}

#[test]
fn test_noise_and_blank_yield_nothing() {
    let (width, height) = (240, 160);
    let mut rng = StdRng::seed_from_u64(7);
    let noise: Vec<u8> = (0..width * height).map(|_| rng.gen_range(0..=255u8)).collect();
    let blank = vec![255u8; width * height];
    let mut speckled = Canvas::new(width, height);
    speckled.fill_rect(Rect::new(0, 0, width, height), 128);
    speckled.add_noise(11, 60);

    let sources: Vec<Source> = vec![
        rust_barcode::PageBitmap::gray(noise, width, height).into(),
        rust_barcode::PageBitmap::gray(blank, width, height).into(),
        speckled.into_bitmap(None).into(),
    ];
    let report = process_many(sources, ScanOptions::default()).expect("pool");
    assert_eq!(report.items.len(), 3);
    for item in &report.items {
        assert_eq!(item.outcome, ItemOutcome::NoBarcodeFound, "{}", item.source.label);
    }
}

#[test]
fn test_scanning_is_idempotent() {
    let (mut canvas, side) = qr_h();
    blot_corner(&mut canvas, side, 0.1);
    let image = canvas.to_image().expect("non-empty");
    let scanner = Scanner::default();
    let first = scanner.scan_image(&image).expect("no deadline");
    let second = scanner.scan_image(&image).expect("no deadline");
    assert!(!first.results.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_crop_area_limits_search() {
    let left = render(Symbology::Ean13, "4006381333931", 3);
    let right = render(Symbology::Code39, "CROP-ME", 3);
    let gap = 120;
    let mut canvas = Canvas::new(
        left.width() + right.width() + 3 * gap,
        left.height().max(right.height()) + 2 * gap,
    );
    canvas.blit(&left, gap, gap);
    let right_x = left.width() + 2 * gap;
    canvas.blit(&right, right_x, gap);
    let crop = Rect::new(right_x, 0, right.width() + gap, canvas.height());

    let options = ScanOptions {
        expect_multiple_barcodes: true,
        crop_area: Some(crop),
        ..ScanOptions::default()
    };
    let outcome = scan(canvas, options);
    let results = outcome.results();
    assert_eq!(results.len(), 1, "{outcome:?}");
    assert_eq!(results[0].text(), "CROP-ME");
    assert!(results[0].bounds().x >= right_x);
}

#[test]
fn test_rotated_symbols() {
    let canvas = render(Symbology::UpcA, "012345678905", 3);
    for turns in 1..4u8 {
        let outcome = scan(canvas.rotated(turns), ScanOptions::default());
        let results = outcome.results();
        assert_eq!(results.len(), 1, "{turns} turns: {outcome:?}");
        assert_eq!(results[0].text(), "012345678905");
    }
    let (qr, _) = qr_h();
    let outcome = scan(qr.rotated(1), ScanOptions::default());
    assert_eq!(outcome.results().first().map(|r| r.text()), Some("012345678905"));
}

#[test]
fn test_linear_symbols_at_oblique_angles() {
    let symbols = [
        (Symbology::UpcA, "012345678905"),
        (Symbology::Ean13, "4006381333931"),
        (Symbology::Code128, "Lot 42"),
    ];
    for (symbology, text) in symbols {
        let canvas = render(symbology, text, 3);
        for degrees in [12.0f32, 18.0, 24.0, 27.0, 160.0] {
            let outcome = scan(canvas.rotated_by(degrees), ScanOptions::default());
            let results = outcome.results();
            assert_eq!(results.len(), 1, "{symbology:?} at {degrees}: {outcome:?}");
            assert_eq!(results[0].text(), text, "{symbology:?} at {degrees}");
            assert_eq!(results[0].symbology(), symbology);
        }
    }
}

#[test]
fn test_qr_at_oblique_angles() {
    let canvas = render(Symbology::QrCode, "HELLO WORLD", 4);
    for degrees in [20.0f32, 36.0, 42.0, 45.0] {
        let outcome = scan(canvas.rotated_by(degrees), ScanOptions::default());
        assert_eq!(
            outcome.results().first().map(|r| r.text()),
            Some("HELLO WORLD"),
            "{degrees}: {outcome:?}"
        );
    }
}

#[test]
fn test_large_image_is_downsampled_for_locating() {
    let canvas = render(Symbology::UpcA, "012345678905", 4);
    let area = canvas.width() * canvas.height();
    let options = ScanOptions {
        max_image_area: area / 3,
        ..ScanOptions::default()
    };
    let image = canvas.to_image().expect("non-empty");
    let report = Scanner::new(options).scan_image(&image).expect("no deadline");
    assert!(report.notes.contains(&QualityNote::Downsampled { factor: 2 }));
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].text(), "012345678905");
    assert!(report.results[0].bounds().fits_within(image.width(), image.height()));
}

#[test]
fn test_low_dpi_source_reports_source_coordinates() {
    let canvas = render(Symbology::Ean13, "5901234123457", 2);
    let (width, height) = (canvas.width(), canvas.height());
    let outcome = Scanner::default().scan(canvas.into_bitmap(Some(100.0)));
    let results = outcome.results();
    assert_eq!(results.len(), 1, "{outcome:?}");
    assert_eq!(results[0].text(), "5901234123457");
    assert!(results[0].bounds().fits_within(width, height));
}

#[test]
fn test_explicit_symbology_list() {
    let canvas = render(Symbology::UpcA, "012345678905", 3);
    let only = |types: Vec<Symbology>| ScanOptions {
        expect_barcode_types: Some(types),
        ..ScanOptions::default()
    };
    let outcome = scan(canvas.clone(), only(vec![Symbology::Code39, Symbology::QrCode]));
    assert_eq!(outcome, ItemOutcome::NoBarcodeFound);
    let outcome = scan(canvas, only(vec![Symbology::QrCode, Symbology::UpcA]));
    assert_eq!(outcome.results().first().map(|r| r.symbology()), Some(Symbology::UpcA));
}
