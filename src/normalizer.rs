//! Image normalizer: any supported input becomes one [`NormalizedImage`].

use crate::config::ScanOptions;
use crate::error::ScanError;
use crate::models::{NormalizedImage, QualityNote, SourceRef};
use crate::utils::grayscale::{
    bilinear_upsample, gray_alpha_to_grayscale, rgb_to_grayscale, rgba_to_grayscale,
};
use image::DynamicImage;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Channel layout of a raw page bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 1 byte per pixel
    Gray,
    /// 2 bytes per pixel, gray then alpha
    GrayAlpha,
    /// 3 bytes per pixel
    Rgb,
    /// 4 bytes per pixel
    Rgba,
}

impl PixelLayout {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::GrayAlpha => 2,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// A pre-rasterized page, as supplied by a page renderer or the caller
#[derive(Debug, Clone)]
pub struct PageBitmap {
    /// Row-major pixel data
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Channel layout of `pixels`
    pub layout: PixelLayout,
    /// Resolution the page was rendered at, if known
    pub dpi: Option<f32>,
    /// Page number within its document
    pub page_index: usize,
}

impl PageBitmap {
    /// Grayscale bitmap of unknown resolution
    pub fn gray(pixels: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            pixels,
            width,
            height,
            layout: PixelLayout::Gray,
            dpi: None,
            page_index: 0,
        }
    }
}

/// Rasterizes pages of a multi-page document (the PDF collaborator).
///
/// `dpi` and `scale` come straight from [`ScanOptions::pdf_dpi`] and
/// [`ScanOptions::pdf_scale`].
pub trait PageRenderer: Send + Sync {
    /// Stable identifier of the document, used in result metadata and logs
    fn document_id(&self) -> &str;

    /// Number of pages
    fn page_count(&self) -> Result<usize, ScanError>;

    /// Render one page
    fn render_page(&self, page: usize, dpi: f32, scale: f32) -> Result<PageBitmap, ScanError>;
}

/// A multi-page source with an optional page allow-list
#[derive(Clone)]
pub struct DocumentSource {
    /// Renderer for the document
    pub renderer: Arc<dyn PageRenderer>,
    /// Pages to scan; `None` scans every page
    pub pages: Option<Vec<usize>>,
}

/// Anything the engine can scan
pub enum Source {
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image in memory
    Bytes(Vec<u8>),
    /// Readable stream holding an encoded image
    Stream(Box<dyn Read + Send>),
    /// Raw bitmap
    Bitmap(PageBitmap),
    /// Multi-page document; the batch orchestrator expands it page by page
    Document(DocumentSource),
}

impl Source {
    /// Short label for logs and result metadata
    pub fn label(&self) -> String {
        match self {
            Source::Path(p) => p.display().to_string(),
            Source::Bytes(b) => format!("bytes[{}]", b.len()),
            Source::Stream(_) => "stream".to_string(),
            Source::Bitmap(b) => format!("bitmap[{}x{}]", b.width, b.height),
            Source::Document(d) => d.renderer.document_id().to_string(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({})", self.label())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<PageBitmap> for Source {
    fn from(bitmap: PageBitmap) -> Self {
        Source::Bitmap(bitmap)
    }
}

/// Normalize a single-image source.
///
/// Fails with `CorruptInput` on empty or undecodable data and with
/// `UnsupportedSourceKind` on unknown containers or unexpanded documents.
pub fn normalize(
    source: Source,
    origin: SourceRef,
    options: &ScanOptions,
) -> Result<NormalizedImage, ScanError> {
    let (pixels, width, height, dpi) = match source {
        Source::Path(path) => {
            let bytes = std::fs::read(&path)
                .map_err(|e| ScanError::CorruptInput(format!("{}: {e}", path.display())))?;
            let (p, w, h) = decode_container(&bytes)?;
            (p, w, h, None)
        }
        Source::Bytes(bytes) => {
            let (p, w, h) = decode_container(&bytes)?;
            (p, w, h, None)
        }
        Source::Stream(mut reader) => {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|e| ScanError::CorruptInput(format!("stream read failed: {e}")))?;
            let (p, w, h) = decode_container(&bytes)?;
            (p, w, h, None)
        }
        Source::Bitmap(bitmap) => {
            let dpi = bitmap.dpi;
            let (p, w, h) = bitmap_to_gray(bitmap)?;
            (p, w, h, dpi)
        }
        Source::Document(doc) => {
            return Err(ScanError::UnsupportedSourceKind(format!(
                "document {} must be expanded into pages",
                doc.renderer.document_id()
            )));
        }
    };

    let image = NormalizedImage::from_gray(pixels, width, height)
        .ok_or_else(|| ScanError::CorruptInput("image has no pixels".to_string()))?
        .with_source(origin)
        .with_dpi(dpi);
    let image = upsample_if_low_dpi(image, options);
    debug!(
        source = %image.source().label,
        width = image.width(),
        height = image.height(),
        "normalized"
    );
    Ok(image)
}

/// Render one page of a document and normalize it
pub fn normalize_page(
    document: &DocumentSource,
    page: usize,
    origin: SourceRef,
    options: &ScanOptions,
) -> Result<NormalizedImage, ScanError> {
    let mut bitmap = document
        .renderer
        .render_page(page, options.pdf_dpi, options.pdf_scale)?;
    bitmap.page_index = page;
    if bitmap.dpi.is_none() {
        bitmap.dpi = Some(options.pdf_dpi * options.pdf_scale);
    }
    normalize(Source::Bitmap(bitmap), origin, options)
}

fn decode_container(bytes: &[u8]) -> Result<(Vec<u8>, usize, usize), ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::CorruptInput("zero-byte input".to_string()));
    }
    let format = image::guess_format(bytes)
        .map_err(|_| ScanError::UnsupportedSourceKind("unrecognized container".to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ScanError::CorruptInput(format!("{format:?}: {e}")))?;
    let width = decoded.width() as usize;
    let height = decoded.height() as usize;
    let gray = match decoded {
        DynamicImage::ImageLuma8(g) => g.into_raw(),
        DynamicImage::ImageLumaA8(ga) => gray_alpha_to_grayscale(ga.as_raw(), width, height),
        DynamicImage::ImageRgb8(rgb) => rgb_to_grayscale(rgb.as_raw(), width, height),
        other => rgba_to_grayscale(other.to_rgba8().as_raw(), width, height),
    };
    Ok((gray, width, height))
}

fn bitmap_to_gray(bitmap: PageBitmap) -> Result<(Vec<u8>, usize, usize), ScanError> {
    let PageBitmap {
        pixels,
        width,
        height,
        layout,
        ..
    } = bitmap;
    let expected = width * height * layout.channels();
    if width == 0 || height == 0 || pixels.len() != expected {
        return Err(ScanError::CorruptInput(format!(
            "bitmap {width}x{height} {layout:?} needs {expected} bytes, got {}",
            pixels.len()
        )));
    }
    let gray = match layout {
        PixelLayout::Gray => pixels,
        PixelLayout::GrayAlpha => gray_alpha_to_grayscale(&pixels, width, height),
        PixelLayout::Rgb => rgb_to_grayscale(&pixels, width, height),
        PixelLayout::Rgba => rgba_to_grayscale(&pixels, width, height),
    };
    Ok((gray, width, height))
}

fn upsample_if_low_dpi(image: NormalizedImage, options: &ScanOptions) -> NormalizedImage {
    let Some(dpi) = image.dpi().filter(|&d| d > 0.0) else {
        return image;
    };
    if dpi >= options.min_useful_dpi {
        return image;
    }
    let area = image.width() * image.height();
    let mut factor = ((options.min_useful_dpi / dpi).ceil() as usize).clamp(2, 4);
    while factor > 1 && area * factor * factor > options.max_image_area {
        factor -= 1;
    }
    if factor < 2 {
        return image;
    }
    let pixels = bilinear_upsample(image.pixels(), image.width(), image.height(), factor);
    let source = image.source().clone();
    let notes = image.notes().to_vec();
    let upsampled = NormalizedImage::from_gray(pixels, image.width() * factor, image.height() * factor);
    match upsampled {
        Some(up) => notes
            .into_iter()
            .fold(up.with_source(source).with_dpi(Some(dpi * factor as f32)), |img, n| {
                img.with_note(n)
            })
            .with_note(QualityNote::Upsampled {
                factor,
                declared_dpi: dpi,
            }),
        None => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::GrayImage::from_fn(width, height, |x, _| image::Luma([if x % 2 == 0 { 0 } else { 255 }]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_zero_byte_is_corrupt() {
        let err = normalize(Source::Bytes(Vec::new()), SourceRef::default(), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::CorruptInput(_)));
    }

    #[test]
    fn test_unknown_container_is_unsupported() {
        let err = normalize(
            Source::Bytes(b"definitely not an image".to_vec()),
            SourceRef::default(),
            &ScanOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedSourceKind(_)));
    }

    #[test]
    fn test_truncated_png_is_corrupt() {
        let mut bytes = png_bytes(16, 16);
        bytes.truncate(40);
        let err = normalize(Source::Bytes(bytes), SourceRef::default(), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::CorruptInput(_)));
    }

    #[test]
    fn test_png_from_stream() {
        let reader = Box::new(Cursor::new(png_bytes(8, 4)));
        let img = normalize(Source::Stream(reader), SourceRef::new(3, "s"), &ScanOptions::default())
            .unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
        assert_eq!(img.pixels()[0], 0);
        assert_eq!(img.pixels()[1], 255);
        assert_eq!(img.source().index, 3);
    }

    #[test]
    fn test_missing_file_is_corrupt() {
        let err = normalize(
            Source::Path(PathBuf::from("/nonexistent/definitely/missing.png")),
            SourceRef::default(),
            &ScanOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::CorruptInput(_)));
    }

    #[test]
    fn test_bitmap_size_mismatch() {
        let bitmap = PageBitmap {
            pixels: vec![0; 10],
            width: 2,
            height: 2,
            layout: PixelLayout::Rgb,
            dpi: None,
            page_index: 0,
        };
        let err = normalize(Source::Bitmap(bitmap), SourceRef::default(), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::CorruptInput(_)));
    }

    #[test]
    fn test_low_dpi_upsampled() {
        let mut bitmap = PageBitmap::gray(vec![128; 100], 10, 10);
        bitmap.dpi = Some(72.0);
        let img = normalize(Source::Bitmap(bitmap), SourceRef::default(), &ScanOptions::default())
            .unwrap();
        assert_eq!(img.width(), 30);
        assert!(matches!(
            img.notes(),
            [QualityNote::Upsampled { factor: 3, .. }]
        ));
    }

    #[test]
    fn test_document_needs_expansion() {
        struct Empty;
        impl PageRenderer for Empty {
            fn document_id(&self) -> &str {
                "empty.pdf"
            }
            fn page_count(&self) -> Result<usize, ScanError> {
                Ok(0)
            }
            fn render_page(&self, _: usize, _: f32, _: f32) -> Result<PageBitmap, ScanError> {
                Err(ScanError::ItemProcessingError("no pages".into()))
            }
        }
        let source = Source::Document(DocumentSource {
            renderer: Arc::new(Empty),
            pages: None,
        });
        let err = normalize(source, SourceRef::default(), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedSourceKind(_)));
    }
}
