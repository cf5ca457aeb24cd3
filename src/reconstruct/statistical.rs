//! Statistical pass: propose values for uncertain positions and keep the
//! most likely proposal the symbology accepts.
//!
//! Linear symbols use the ranked alternatives of the flagged position and
//! try them in order of measurement cost. QR symbols have no per-codeword
//! alternatives; instead the lowest-confidence codewords are handed to
//! Reed-Solomon as erasures in widening beams, and a beam only counts when
//! no codeword outside it needed fixing.
//! Both searches are deterministic.

use super::ReconstructionFailed;
use crate::decoder::qr::tables::BlockLayout;
use crate::decoder::{Layout, PartialDecode, SymbolDecoder};

/// Uncertain positions the linear search will fill in. A single check
/// character pins down one missing value and no more.
pub const MAX_UNKNOWNS: usize = 1;
/// Alternatives considered per position
const MAX_CHOICES: usize = 5;
/// Alternatives costlier than the best by more than this are dropped
const MAX_COST_SPREAD: f32 = 1.0;
/// A rival valid candidate this close in cost makes the result ambiguous
const AMBIGUITY_MARGIN: f32 = 0.25;
/// Erasure beam widths as fractions of the per-block budget
const BEAM_FRACTIONS: [f32; 4] = [0.25, 0.5, 0.75, 1.0];
/// Check codewords kept free of erasures in every block
const BEAM_RESERVE: usize = 2;

/// An accepted proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full codeword sequence
    pub codewords: Vec<u16>,
    /// Positions whose values came from the search
    pub reconstructed: usize,
    /// Positions in the symbol
    pub total: usize,
}

/// Run the pass appropriate to the read's layout
pub fn search(
    decoder: &dyn SymbolDecoder,
    partial: &PartialDecode,
) -> Result<Candidate, ReconstructionFailed> {
    match partial.layout() {
        Layout::Linear => checksum_search(decoder, partial),
        Layout::Qr(_) => erasure_beam(decoder, partial),
    }
}

fn checksum_search(
    decoder: &dyn SymbolDecoder,
    partial: &PartialDecode,
) -> Result<Candidate, ReconstructionFailed> {
    // an unflagged read that fails its check has no known bad position
    let positions = partial.damage().flagged();
    if positions.is_empty() {
        return Err(ReconstructionFailed::NoCandidate);
    }
    if positions.len() > MAX_UNKNOWNS {
        return Err(ReconstructionFailed::TooManyUnknowns {
            flagged: positions.len(),
        });
    }

    // (value, cost) choices per position, best first
    let choices: Vec<Vec<(u16, f32)>> = positions
        .iter()
        .map(|&p| {
            let alternatives = partial.damage().alternatives(p);
            match alternatives.first() {
                None => vec![(partial.codewords()[p], 0.0)],
                Some(best) => alternatives
                    .iter()
                    .take(MAX_CHOICES)
                    .filter(|a| a.cost <= best.cost + MAX_COST_SPREAD)
                    .map(|a| (a.value, a.cost))
                    .collect(),
            }
        })
        .collect();

    let mut combos: Vec<(f32, Vec<usize>)> = vec![(0.0, Vec::new())];
    for options in &choices {
        combos = combos
            .into_iter()
            .flat_map(|(cost, picks)| {
                options.iter().enumerate().map(move |(i, &(_, c))| {
                    let mut picks = picks.clone();
                    picks.push(i);
                    (cost + c, picks)
                })
            })
            .collect();
    }
    combos.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let build = |picks: &[usize]| {
        let mut codewords = partial.codewords().to_vec();
        for ((&p, options), &i) in positions.iter().zip(&choices).zip(picks) {
            codewords[p] = options[i].0;
        }
        codewords
    };

    let mut valid = combos
        .iter()
        .map(|(cost, picks)| (*cost, build(picks)))
        .filter(|(_, codewords)| decoder.is_valid(partial, codewords));
    let (best_cost, codewords) = valid.next().ok_or(ReconstructionFailed::NoCandidate)?;
    if let Some((rival_cost, _)) = valid.next()
        && rival_cost - best_cost < AMBIGUITY_MARGIN
    {
        return Err(ReconstructionFailed::Ambiguous);
    }
    Ok(Candidate {
        codewords,
        reconstructed: positions.len(),
        total: partial.codewords().len(),
    })
}

fn erasure_beam(
    decoder: &dyn SymbolDecoder,
    partial: &PartialDecode,
) -> Result<Candidate, ReconstructionFailed> {
    let Layout::Qr(qr) = partial.layout() else {
        return Err(ReconstructionFailed::NoCandidate);
    };
    let layout = BlockLayout::new(qr.version, qr.ec_level).ok_or(ReconstructionFailed::NoCandidate)?;
    let budget = layout.ecc_per_block.saturating_sub(BEAM_RESERVE);
    if budget == 0 {
        return Err(ReconstructionFailed::NoCandidate);
    }

    // interleaved indices of every block, least confident first
    let damage = partial.damage();
    let mut per_block: Vec<Vec<usize>> = vec![Vec::new(); layout.blocks];
    for (i, &(b, _)) in layout.interleave_order().iter().enumerate() {
        per_block[b].push(i);
    }
    for indices in &mut per_block {
        indices.sort_by(|&a, &b| {
            damage
                .confidence(a)
                .total_cmp(&damage.confidence(b))
                .then(a.cmp(&b))
        });
    }

    let mut tried = 0;
    for fraction in BEAM_FRACTIONS {
        let width = ((budget as f32 * fraction).round() as usize).clamp(1, budget);
        if width <= tried {
            continue;
        }
        tried = width;
        let mut erasures: Vec<usize> = per_block
            .iter()
            .flat_map(|indices| indices.iter().take(width).copied())
            .collect();
        erasures.sort_unstable();
        // errors outside the beam mean the guess about the damage was wrong
        if let Some(outcome) = decoder.correct(partial, &erasures)
            && outcome.errors == 0
            && decoder.is_valid(partial, &outcome.codewords)
        {
            return Ok(Candidate {
                codewords: outcome.codewords,
                reconstructed: outcome.changed,
                total: layout.total_codewords,
            });
        }
    }
    Err(ReconstructionFailed::NoCandidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Alternative, DamageMap, RegionQuality, decoder_for};
    use crate::models::{Rect, Symbology};

    fn ean8(codewords: Vec<u16>, damage: DamageMap) -> PartialDecode {
        PartialDecode::new(
            Symbology::Ean8,
            codewords,
            damage,
            Layout::Linear,
            Rect::new(0, 0, 10, 10),
            RegionQuality { contrast: 1.0, rotation_deg: 0.0 },
        )
    }

    fn alt(value: u16, cost: f32) -> Alternative {
        Alternative { value, cost }
    }

    #[test]
    fn test_flagged_digit_is_filled_from_the_check_digit() {
        // 9638507|4 with the 5 at position 4 too worn to read cleanly
        let mut damage = DamageMap::new();
        for i in 0..8 {
            if i == 4 {
                damage.push(true, 0.2, vec![alt(6, 1.2), alt(5, 1.3), alt(9, 1.5)]);
            } else {
                damage.push(false, 0.9, vec![]);
            }
        }
        let read = vec![9, 6, 3, 8, 6, 0, 7, 4];
        let c = search(decoder_for(Symbology::Ean8), &ean8(read, damage)).unwrap();
        assert_eq!(c.codewords, vec![9, 6, 3, 8, 5, 0, 7, 4]);
        assert_eq!((c.reconstructed, c.total), (1, 8));
    }

    #[test]
    fn test_unflagged_invalid_read_is_not_guessed() {
        // clean digits that miss the check sum give no hint where the error is
        let mut damage = DamageMap::new();
        for i in 0..8 {
            let confidence = if i == 4 { 0.2 } else { 0.9 };
            damage.push(false, confidence, vec![alt(6, 1.2), alt(5, 1.3)]);
        }
        let read = vec![9, 6, 3, 8, 6, 0, 7, 4];
        let r = search(decoder_for(Symbology::Ean8), &ean8(read, damage));
        assert_eq!(r, Err(ReconstructionFailed::NoCandidate));
    }

    #[test]
    fn test_distant_alternative_not_accepted() {
        // only the 5 fixes the check sum, but it measured far worse than the 6
        let mut damage = DamageMap::new();
        for i in 0..8 {
            if i == 4 {
                damage.push(true, 0.2, vec![alt(6, 0.9), alt(2, 1.2), alt(5, 2.4)]);
            } else {
                damage.push(false, 0.9, vec![]);
            }
        }
        let read = vec![9, 6, 3, 8, 6, 0, 7, 4];
        let r = search(decoder_for(Symbology::Ean8), &ean8(read, damage));
        assert_eq!(r, Err(ReconstructionFailed::NoCandidate));
    }

    #[test]
    fn test_ambiguous_candidates_rejected() {
        // no check character, and two equally cheap readings of the worn one
        let mut damage = DamageMap::new();
        for i in 0..5 {
            if i == 2 {
                damage.push(true, 0.3, vec![alt(11, 1.0), alt(12, 1.1)]);
            } else {
                damage.push(false, 1.0, vec![]);
            }
        }
        let partial = PartialDecode::new(
            Symbology::Code39,
            vec![1, 2, 11, 3, 4],
            damage,
            Layout::Linear,
            Rect::new(0, 0, 10, 10),
            RegionQuality { contrast: 1.0, rotation_deg: 0.0 },
        );
        let r = search(decoder_for(Symbology::Code39), &partial);
        assert_eq!(r, Err(ReconstructionFailed::Ambiguous));
    }

    #[test]
    fn test_too_many_unknowns() {
        let mut damage = DamageMap::new();
        for _ in 0..8 {
            damage.push(true, 0.1, vec![alt(0, 1.0)]);
        }
        let r = search(decoder_for(Symbology::Ean8), &ean8(vec![0; 8], damage));
        assert_eq!(r, Err(ReconstructionFailed::TooManyUnknowns { flagged: 8 }));

        // two flagged digits could satisfy one check digit many ways
        let mut damage = DamageMap::new();
        for i in 0..8 {
            let flagged = i == 0 || i == 1;
            damage.push(flagged, 0.5, vec![alt(1, 1.0), alt(2, 1.1)]);
        }
        let r = search(decoder_for(Symbology::Ean8), &ean8(vec![1, 9, 3, 4, 5, 6, 7, 0], damage));
        assert_eq!(r, Err(ReconstructionFailed::TooManyUnknowns { flagged: 2 }));
    }
}
