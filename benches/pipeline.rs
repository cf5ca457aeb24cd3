use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_barcode::models::NormalizedImage;
use rust_barcode::synth::{self, RenderOptions};
use rust_barcode::{ReadingSpeed, ScanOptions, Scanner, Symbology};

fn rendered(symbology: Symbology, text: &str) -> NormalizedImage {
    let symbol = synth::encode(symbology, text).expect("encodable");
    synth::render(&symbol, RenderOptions::default())
        .to_image()
        .expect("non-empty")
}

fn bench_scan(c: &mut Criterion, name: &str, image: &NormalizedImage, options: ScanOptions) {
    let scanner = Scanner::new(options);
    c.bench_function(name, |b| b.iter(|| scanner.scan_image(black_box(image))));
}

fn bench_linear(c: &mut Criterion) {
    let ean = rendered(Symbology::Ean13, "4006381333931");
    bench_scan(c, "scan_ean13", &ean, ScanOptions::default());
    let code128 = rendered(Symbology::Code128, "Order #4711 / Lot 2026");
    bench_scan(c, "scan_code128", &code128, ScanOptions::default());
}

fn bench_qr(c: &mut Criterion) {
    let qr = rendered(Symbology::QrCode, "https://example.com/a?b=c");
    bench_scan(c, "scan_qr", &qr, ScanOptions::default());
    let faster = ScanOptions {
        reading_speed: ReadingSpeed::Faster,
        ..ScanOptions::default()
    };
    bench_scan(c, "scan_qr_faster", &qr, faster);
}

fn bench_empty(c: &mut Criterion) {
    let blank = NormalizedImage::from_gray(vec![255u8; 640 * 480], 640, 480).expect("non-empty");
    bench_scan(c, "scan_blank_640x480", &blank, ScanOptions::default());
}

criterion_group!(benches, bench_linear, bench_qr, bench_empty);
criterion_main!(benches);
