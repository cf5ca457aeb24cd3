use super::RegionClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every barcode standard the engine can read.
///
/// The set is closed on purpose: each variant maps to exactly one decoder,
/// see [`crate::decoder::decoder_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbology {
    /// UPC-A, 12 digits
    UpcA,
    /// EAN-13, 13 digits
    Ean13,
    /// EAN-8, 8 digits
    Ean8,
    /// Code 128 (sets A, B, C)
    Code128,
    /// Code 39 (3 of 9)
    Code39,
    /// Interleaved 2 of 5
    Itf,
    /// QR Code, model 2
    QrCode,
}

impl Symbology {
    /// All supported symbologies in default priority order
    pub const ALL: [Symbology; 7] = [
        Symbology::UpcA,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Itf,
        Symbology::QrCode,
    ];

    /// Structural family
    pub fn class(self) -> RegionClass {
        match self {
            Symbology::QrCode => RegionClass::Matrix,
            _ => RegionClass::Linear,
        }
    }

    /// Whether the symbology carries error-correction codewords
    pub fn has_ecc(self) -> bool {
        matches!(self, Symbology::QrCode)
    }

    /// Whether the symbology carries a mandatory check digit/symbol
    pub fn has_checksum(self) -> bool {
        matches!(
            self,
            Symbology::UpcA | Symbology::Ean13 | Symbology::Ean8 | Symbology::Code128
        )
    }

    /// Short stable name used in logs, CLI output and config
    pub fn name(self) -> &'static str {
        match self {
            Symbology::UpcA => "upc-a",
            Symbology::Ean13 => "ean-13",
            Symbology::Ean8 => "ean-8",
            Symbology::Code128 => "code-128",
            Symbology::Code39 => "code-39",
            Symbology::Itf => "itf",
            Symbology::QrCode => "qr",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a symbology name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown symbology: {0}")]
pub struct UnknownSymbology(pub String);

impl FromStr for Symbology {
    type Err = UnknownSymbology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "upca" | "upc" => Ok(Symbology::UpcA),
            "ean13" | "ean" => Ok(Symbology::Ean13),
            "ean8" => Ok(Symbology::Ean8),
            "code128" => Ok(Symbology::Code128),
            "code39" => Ok(Symbology::Code39),
            "itf" | "interleaved2of5" | "i2of5" => Ok(Symbology::Itf),
            "qr" | "qrcode" => Ok(Symbology::QrCode),
            _ => Err(UnknownSymbology(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("UPC-A".parse::<Symbology>(), Ok(Symbology::UpcA));
        assert_eq!("code_128".parse::<Symbology>(), Ok(Symbology::Code128));
        assert_eq!("QRCode".parse::<Symbology>(), Ok(Symbology::QrCode));
        assert!("aztec".parse::<Symbology>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for s in Symbology::ALL {
            assert_eq!(s.to_string().parse::<Symbology>(), Ok(s));
        }
    }

    #[test]
    fn test_classes() {
        assert_eq!(Symbology::QrCode.class(), RegionClass::Matrix);
        assert!(Symbology::ALL[..6].iter().all(|s| s.class() == RegionClass::Linear));
        assert!(!Symbology::Code39.has_checksum());
        assert!(Symbology::QrCode.has_ecc());
    }
}
