//! Confidence scoring.
//!
//! Each reconstruction path owns a band, so a repaired read can never
//! outscore a clean one:
//!
//! | path            | band   | falls with                              |
//! |-----------------|--------|-----------------------------------------|
//! | clean           | 95-100 | poorer contrast, rotation off the axes  |
//! | ECC-corrected   | 70-94  | share of the ECC capacity used          |
//! | reconstructed   | 30-69  | share of positions guessed              |

use crate::decoder::RegionQuality;
use crate::reconstruct::Reconstruction;
use crate::utils::geometry::axis_residue;

const CLEAN_FLOOR: f32 = 95.0;
const CLEAN_SPAN: f32 = 5.0;
const ECC_CEILING: u8 = 94;
const ECC_FLOOR: u8 = 70;
const ECC_SPAN: f32 = 24.0;
const CORROBORATION_BONUS: u8 = 2;
const RECONSTRUCTED_CEILING: u8 = 69;
const RECONSTRUCTED_FLOOR: u8 = 30;
const RECONSTRUCTED_SPAN: f32 = 39.0;
/// A quarter of the positions guessed already scores the band floor
const RECONSTRUCTED_SATURATION: f32 = 4.0;

/// Image quality in `[0, 1]` from contrast and rotation residue
pub fn image_quality(quality: RegionQuality) -> f32 {
    let contrast = quality.contrast.clamp(0.0, 1.0);
    let alignment = 1.0 - axis_residue(quality.rotation_deg) / 45.0;
    (0.7 * contrast + 0.3 * alignment).clamp(0.0, 1.0)
}

/// Score a terminal state; `None` for a failed reconstruction
pub fn score(outcome: &Reconstruction, quality: RegionQuality) -> Option<u8> {
    match outcome {
        Reconstruction::Clean { .. } => {
            Some((CLEAN_FLOOR + (CLEAN_SPAN * image_quality(quality)).round()) as u8)
        }
        Reconstruction::EccCorrected {
            errors,
            erasures,
            capacity,
            corroborated,
            ..
        } => {
            let used = if *capacity == 0 {
                1.0
            } else {
                ((errors + erasures) as f32 / *capacity as f32).min(1.0)
            };
            let mut s = ECC_CEILING - (ECC_SPAN * used).round() as u8;
            if *corroborated {
                s = (s + CORROBORATION_BONUS).min(ECC_CEILING);
            }
            Some(s.clamp(ECC_FLOOR, ECC_CEILING))
        }
        Reconstruction::Reconstructed {
            reconstructed,
            total,
            ..
        } => {
            let share = if *total == 0 {
                1.0
            } else {
                (RECONSTRUCTED_SATURATION * *reconstructed as f32 / *total as f32).min(1.0)
            };
            let s = RECONSTRUCTED_CEILING - (RECONSTRUCTED_SPAN * share).round() as u8;
            Some(s.clamp(RECONSTRUCTED_FLOOR, RECONSTRUCTED_CEILING))
        }
        Reconstruction::Failed(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::ReconstructionFailed;

    const SHARP: RegionQuality = RegionQuality {
        contrast: 1.0,
        rotation_deg: 0.0,
    };

    fn ecc(errors: usize, erasures: usize, corroborated: bool) -> Reconstruction {
        Reconstruction::EccCorrected {
            codewords: Vec::new(),
            errors,
            erasures,
            capacity: 28,
            corroborated,
        }
    }

    fn rebuilt(reconstructed: usize, total: usize) -> Reconstruction {
        Reconstruction::Reconstructed {
            codewords: Vec::new(),
            reconstructed,
            total,
        }
    }

    #[test]
    fn test_clean_band() {
        let clean = Reconstruction::Clean { codewords: Vec::new() };
        assert_eq!(score(&clean, SHARP), Some(100));
        let poor = RegionQuality {
            contrast: 0.2,
            rotation_deg: 45.0,
        };
        assert_eq!(score(&clean, poor), Some(96));
        let worst = RegionQuality {
            contrast: 0.0,
            rotation_deg: 45.0,
        };
        assert_eq!(score(&clean, worst), Some(95));
    }

    #[test]
    fn test_ecc_band_monotone() {
        let mut last = u8::MAX;
        for used in 0..=40 {
            let s = score(&ecc(used / 3, used - used / 3, false), SHARP).unwrap();
            assert!((70..=94).contains(&s));
            assert!(s <= last);
            last = s;
        }
        assert_eq!(score(&ecc(0, 0, true), SHARP), Some(94));
        assert_eq!(score(&ecc(4, 6, true), SHARP), Some(87));
    }

    #[test]
    fn test_reconstructed_band() {
        assert_eq!(score(&rebuilt(1, 100), SHARP), Some(67));
        assert_eq!(score(&rebuilt(3, 12), SHARP), Some(30));
        assert_eq!(score(&rebuilt(1, 12), SHARP), Some(56));
        assert_eq!(score(&Reconstruction::Failed(ReconstructionFailed::NoCandidate), SHARP), None);
    }

    #[test]
    fn test_bands_never_cross() {
        let clean = Reconstruction::Clean { codewords: Vec::new() };
        let floor = RegionQuality {
            contrast: 0.0,
            rotation_deg: 45.0,
        };
        assert!(score(&clean, floor) > score(&ecc(0, 0, true), SHARP));
        assert!(score(&ecc(28, 28, false), SHARP) > score(&rebuilt(0, 10), SHARP));
    }
}
