//! Reference encoders and a raster renderer for every supported symbology.
//!
//! Used by the tests and benches to produce known-good symbols and to damage
//! them in controlled ways. Nothing in the scanning path depends on it.

pub mod canvas;
pub mod linear;
pub mod qr;

pub use canvas::Canvas;
pub use qr::{QrOptions, QrSymbol, encode_qr};

use crate::models::{BitMatrix, Symbology};

/// An encoded symbol ready to render
#[derive(Debug, Clone)]
pub enum Symbol {
    /// Module sequence of a linear symbol, `true` = bar
    Linear(Vec<bool>),
    /// Module grid of a matrix symbol, set = dark
    Matrix(BitMatrix),
}

impl Symbol {
    /// Width and height in modules (height 1 for linear symbols)
    pub fn modules(&self) -> (usize, usize) {
        match self {
            Symbol::Linear(m) => (m.len(), 1),
            Symbol::Matrix(m) => (m.width(), m.height()),
        }
    }
}

/// Encode `text` with default settings (QR at level M)
pub fn encode(symbology: Symbology, text: &str) -> Option<Symbol> {
    match symbology {
        Symbology::QrCode => encode_qr(text, QrOptions::default()).map(|s| Symbol::Matrix(s.modules)),
        _ => linear::encode_linear(symbology, text).map(Symbol::Linear),
    }
}

/// Rendering geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pixels per module
    pub module_px: usize,
    /// Bar height of linear symbols in pixels
    pub bar_height_px: usize,
    /// Light margin on every side, in modules
    pub quiet_modules: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            module_px: 3,
            bar_height_px: 90,
            quiet_modules: 10,
        }
    }
}

/// Render one symbol on its own canvas, quiet zone included
pub fn render(symbol: &Symbol, options: RenderOptions) -> Canvas {
    let m = options.module_px.max(1);
    let quiet = options.quiet_modules * m;
    match symbol {
        Symbol::Linear(modules) => {
            let mut c = Canvas::new(modules.len() * m + 2 * quiet, options.bar_height_px + 2 * quiet);
            c.draw_bars(modules, quiet, quiet, m, options.bar_height_px);
            c
        }
        Symbol::Matrix(modules) => {
            let mut c = Canvas::new(modules.width() * m + 2 * quiet, modules.height() * m + 2 * quiet);
            c.draw_matrix(modules, quiet, quiet, m);
            c
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_symbology_encodes() {
        let samples = [
            (Symbology::UpcA, "012345678905"),
            (Symbology::Ean13, "4006381333931"),
            (Symbology::Ean8, "96385074"),
            (Symbology::Code128, "Hello"),
            (Symbology::Code39, "CODE-39"),
            (Symbology::Itf, "12345670"),
            (Symbology::QrCode, "hello"),
        ];
        for (symbology, text) in samples {
            assert!(encode(symbology, text).is_some(), "{symbology}");
        }
    }

    #[test]
    fn test_render_size() {
        let symbol = encode(Symbology::Ean8, "96385074").unwrap();
        let c = render(&symbol, RenderOptions::default());
        assert_eq!(c.width(), 67 * 3 + 60);
        assert_eq!(c.height(), 90 + 60);
        let qr = encode(Symbology::QrCode, "hello").unwrap();
        assert_eq!(qr.modules(), (21, 21));
    }
}
