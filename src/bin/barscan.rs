use clap::{Parser, Subcommand};
use rust_barcode::synth::{self, RenderOptions};
use rust_barcode::{BatchScanner, ItemOutcome, ReadingSpeed, ScanOptions, Source, Symbology};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "barscan", version, about = "Scan images for barcodes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan image files and print one line per result
    Scan {
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Report every barcode, not just the first per image
        #[arg(long)]
        multiple: bool,
        /// Comma-separated symbology allow-list, e.g. "ean-13,qr"
        #[arg(long, value_delimiter = ',')]
        types: Vec<Symbology>,
        /// faster, balanced or detailed
        #[arg(long)]
        speed: Option<ReadingSpeed>,
        /// Worker threads, 0 = one per core
        #[arg(long)]
        threads: Option<usize>,
        /// Per-item timeout in milliseconds, 0 disables it
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Render a reference symbol to a PNG file
    Render {
        /// Symbology name
        symbology: Symbology,
        /// Content to encode
        text: String,
        /// Output PNG path
        #[arg(long, short)]
        out: PathBuf,
        /// Pixels per module
        #[arg(long, default_value_t = 4)]
        module_px: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Scan {
            files,
            multiple,
            types,
            speed,
            threads,
            timeout_ms,
        } => {
            let mut options = ScanOptions::default().with_env_overrides();
            options.expect_multiple_barcodes |= multiple;
            if !types.is_empty() {
                options.expect_barcode_types = Some(types);
            }
            if let Some(speed) = speed {
                options.reading_speed = speed;
            }
            if let Some(threads) = threads {
                options.max_parallel_threads = threads;
            }
            if let Some(ms) = timeout_ms {
                options.item_timeout_ms = ms;
            }
            scan_cmd(files, options)
        }
        Command::Render {
            symbology,
            text,
            out,
            module_px,
        } => render_cmd(symbology, &text, out, module_px),
    }
}

fn scan_cmd(files: Vec<PathBuf>, options: ScanOptions) -> ExitCode {
    let scanner = match BatchScanner::new(options) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("barscan: {e}");
            return ExitCode::FAILURE;
        }
    };
    let start = Instant::now();
    let sources = files.into_iter().map(Source::Path).collect();
    let report = scanner.process_many(sources);

    let mut failed = false;
    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Found(results) => {
                for r in results {
                    let b = r.bounds();
                    println!(
                        "{}\t{}\t{}\t{:?}\t{},{},{},{}\t{}",
                        item.source.label,
                        r.symbology(),
                        r.confidence(),
                        r.reconstruction_path(),
                        b.x,
                        b.y,
                        b.width,
                        b.height,
                        r.text()
                    );
                }
            }
            ItemOutcome::NoBarcodeFound => println!("{}\t-", item.source.label),
            ItemOutcome::Failed(e) => {
                failed = true;
                eprintln!("{}\terror: {e}", item.source.label);
            }
        }
    }
    eprintln!(
        "{} items, {} results, {} failed in {:.2?} on {} workers",
        report.items.len(),
        report.results().count(),
        report.failures().count(),
        start.elapsed(),
        scanner.workers()
    );
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn render_cmd(symbology: Symbology, text: &str, out: PathBuf, module_px: usize) -> ExitCode {
    let Some(symbol) = synth::encode(symbology, text) else {
        eprintln!("barscan: {symbology} cannot encode {text:?}");
        return ExitCode::FAILURE;
    };
    let canvas = synth::render(
        &symbol,
        RenderOptions {
            module_px,
            ..RenderOptions::default()
        },
    );
    let written = canvas
        .to_png()
        .map_err(|e| e.to_string())
        .and_then(|png| std::fs::write(&out, png).map_err(|e| e.to_string()));
    match written {
        Ok(()) => {
            println!("{}", out.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("barscan: {}: {e}", out.display());
            ExitCode::FAILURE
        }
    }
}
