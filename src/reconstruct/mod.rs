//! Reconstruction engine: turns a [`PartialDecode`] into final codewords.
//!
//! ```text
//! valid and (unflagged or ECC-protected) ─────────────► Clean
//! flagged, ECC symbology ── correct(flags as erasures) ─► EccCorrected
//! ECC absent or failed ──── statistical pass ──────────► Reconstructed
//! anything else ───────────────────────────────────────► Failed
//! ```
//!
//! [`ReadingSpeed`] decides when the statistical pass runs. The engine is
//! pure: the same input always reaches the same terminal state.

pub mod reed_solomon;
pub mod statistical;

use crate::config::ReadingSpeed;
use crate::decoder::{PartialDecode, SymbolDecoder, decoder_for};
use crate::models::ReconstructionPath;
use thiserror::Error;
use tracing::{debug, trace};

/// Why a read produced no codewords
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionFailed {
    /// Error correction failed and the statistical pass was not allowed
    #[error("uncorrectable and the statistical pass is disabled")]
    StatisticalPassSkipped,
    /// Too many uncertain positions to search
    #[error("{flagged} uncertain positions exceed the search limit")]
    TooManyUnknowns {
        /// Positions that would need guessing
        flagged: usize,
    },
    /// No candidate satisfied the symbology's checks
    #[error("no candidate satisfies the symbology's checks")]
    NoCandidate,
    /// Two candidates were about as likely
    #[error("more than one candidate is plausible")]
    Ambiguous,
}

/// Terminal state of the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Reconstruction {
    /// Read as-is
    Clean {
        /// Final codewords
        codewords: Vec<u16>,
    },
    /// Repaired by the symbology's error correction
    EccCorrected {
        /// Final codewords
        codewords: Vec<u16>,
        /// Codewords fixed without a flag
        errors: usize,
        /// Flagged codewords handed over as erasures
        erasures: usize,
        /// Error-correction codewords in the symbol
        capacity: usize,
        /// The statistical pass reached the same codewords
        corroborated: bool,
    },
    /// Completed by the statistical pass
    Reconstructed {
        /// Final codewords
        codewords: Vec<u16>,
        /// Positions whose value came from the search
        reconstructed: usize,
        /// Positions in the symbol
        total: usize,
    },
    /// No usable codewords
    Failed(ReconstructionFailed),
}

impl Reconstruction {
    /// Final codewords unless failed
    pub fn codewords(&self) -> Option<&[u16]> {
        match self {
            Reconstruction::Clean { codewords }
            | Reconstruction::EccCorrected { codewords, .. }
            | Reconstruction::Reconstructed { codewords, .. } => Some(codewords),
            Reconstruction::Failed(_) => None,
        }
    }

    /// Path flag reported on the result
    pub fn path(&self) -> Option<ReconstructionPath> {
        match self {
            Reconstruction::Clean { .. } => Some(ReconstructionPath::None),
            Reconstruction::EccCorrected { .. } => Some(ReconstructionPath::EccCorrected),
            Reconstruction::Reconstructed { .. } => {
                Some(ReconstructionPath::StatisticallyReconstructed)
            }
            Reconstruction::Failed(_) => None,
        }
    }
}

/// Run the state machine on one read
pub fn reconstruct(partial: &PartialDecode, speed: ReadingSpeed) -> Reconstruction {
    reconstruct_with(decoder_for(partial.symbology()), partial, speed)
}

/// [`reconstruct`] with an explicit decoder
pub fn reconstruct_with(
    decoder: &dyn SymbolDecoder,
    partial: &PartialDecode,
    speed: ReadingSpeed,
) -> Reconstruction {
    let symbology = partial.symbology();
    let flagged = partial.damage().flagged();
    let has_ecc = symbology.has_ecc();

    if decoder.is_valid(partial, partial.codewords()) && (flagged.is_empty() || has_ecc) {
        return Reconstruction::Clean {
            codewords: partial.codewords().to_vec(),
        };
    }

    let corrected = if has_ecc {
        decoder
            .correct(partial, &flagged)
            .filter(|o| decoder.is_valid(partial, &o.codewords))
    } else {
        None
    };

    match (corrected, speed) {
        (Some(ecc), ReadingSpeed::Detailed) => {
            let corroborated = statistical::search(decoder, partial)
                .is_ok_and(|c| c.codewords == ecc.codewords);
            trace!(%symbology, corroborated, "ecc corrected, statistical pass compared");
            Reconstruction::EccCorrected {
                codewords: ecc.codewords,
                errors: ecc.errors,
                erasures: ecc.erasures,
                capacity: ecc.capacity,
                corroborated,
            }
        }
        (Some(ecc), _) => Reconstruction::EccCorrected {
            codewords: ecc.codewords,
            errors: ecc.errors,
            erasures: ecc.erasures,
            capacity: ecc.capacity,
            corroborated: false,
        },
        (None, ReadingSpeed::Faster) => {
            debug!(%symbology, flagged = flagged.len(), "reconstruction failed");
            Reconstruction::Failed(ReconstructionFailed::StatisticalPassSkipped)
        }
        (None, _) => match statistical::search(decoder, partial) {
            Ok(c) => Reconstruction::Reconstructed {
                codewords: c.codewords,
                reconstructed: c.reconstructed,
                total: c.total,
            },
            Err(e) => {
                debug!(%symbology, error = %e, "reconstruction failed");
                Reconstruction::Failed(e)
            }
        },
    }
}
