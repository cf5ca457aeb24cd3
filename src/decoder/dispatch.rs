//! Symbology dispatch: which decoders to try on a region, and in what order.

use super::{DecodeAttempt, PartialDecode, RegionContext, decoder_for};
use crate::config::ScanOptions;
use crate::models::{RegionClass, Symbology};
use tracing::trace;

/// Linear decoders first, UPC-A ahead of EAN-13 so a leading-zero EAN-13
/// reports as UPC-A
const LINEAR_FIRST: [Symbology; 7] = [
    Symbology::UpcA,
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::Code128,
    Symbology::Code39,
    Symbology::Itf,
    Symbology::QrCode,
];

const MATRIX_FIRST: [Symbology; 7] = [
    Symbology::QrCode,
    Symbology::UpcA,
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::Code128,
    Symbology::Code39,
    Symbology::Itf,
];

/// Decoder ordering for one scan
#[derive(Debug, Clone)]
pub struct Dispatcher {
    explicit: Option<Vec<Symbology>>,
}

impl Dispatcher {
    /// Dispatcher honoring the options' allow-list, if any
    pub fn new(options: &ScanOptions) -> Self {
        let explicit = options.expect_barcode_types.as_ref().map(|types| {
            let mut seen = Vec::with_capacity(types.len());
            for &t in types {
                if !seen.contains(&t) {
                    seen.push(t);
                }
            }
            seen
        });
        Self { explicit }
    }

    /// Symbologies to try on a region of the given class.
    ///
    /// An explicit allow-list is used as given; otherwise the class tag
    /// decides whether linear or matrix decoders go first.
    pub fn order(&self, class: RegionClass) -> Vec<Symbology> {
        match (&self.explicit, class) {
            (Some(list), _) => list.clone(),
            (None, RegionClass::Matrix) => MATRIX_FIRST.to_vec(),
            (None, _) => LINEAR_FIRST.to_vec(),
        }
    }

    /// Lazily run each decoder on the region, yielding every acceptance.
    ///
    /// Callers that only need the first decode stop pulling after it.
    pub fn dispatch<'c, 'a>(
        &self,
        context: &'c RegionContext<'a>,
    ) -> impl Iterator<Item = PartialDecode> + 'c
    where
        'a: 'c,
    {
        self.order(context.region().class())
            .into_iter()
            .filter_map(move |symbology| {
                let attempt = DecodeAttempt::new(context, symbology);
                match decoder_for(symbology).try_decode(&attempt) {
                    Ok(partial) => Some(partial),
                    Err(_) => {
                        trace!(%symbology, "not this symbology");
                        None
                    }
                }
            })
    }
}
