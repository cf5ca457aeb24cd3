//! Linear (1D) symbologies.
//!
//! Each grammar reads runs along one scanline into per-character costs.
//! Reads from all lines and both directions are then voted position by
//! position: a position is certain when at least one line read it cleanly
//! and the clean reads agree, otherwise it goes into the damage map with
//! its ranked alternatives.

pub mod code128;
pub mod code39;
pub mod ean;
pub mod itf;
pub mod scanline;

use super::{Alternative, DamageMap, DecodeAttempt, Layout, PartialDecode, RegionQuality};
use crate::error::NotThisSymbology;
use crate::models::{Point, Rect, Symbology};
use scanline::{Line, Run};
use std::collections::BTreeMap;
use tracing::trace;

/// Best cost above which a character counts as unreadable
const MAX_CLEAN_COST: f32 = 1.4;
/// Minimum gap between the best and second-best cost of a clean character
const MIN_MARGIN: f32 = 0.4;
/// Alternatives kept per character
const MAX_ALTERNATIVES: usize = 6;
/// Cost charged to a value that a read did not rank at all
const MISSING_COST: f32 = 3.0;

/// Ranked candidates for one symbol character
#[derive(Debug, Clone, PartialEq)]
pub struct CharRead {
    alternatives: Vec<Alternative>,
}

impl CharRead {
    /// Rank `(value, cost)` pairs; `None` when nothing was offered
    pub fn from_costs(costs: impl IntoIterator<Item = (u16, f32)>) -> Option<Self> {
        let mut alternatives: Vec<Alternative> = costs
            .into_iter()
            .map(|(value, cost)| Alternative { value, cost })
            .collect();
        alternatives.sort_by(|a, b| a.cost.total_cmp(&b.cost).then(a.value.cmp(&b.value)));
        alternatives.truncate(MAX_ALTERNATIVES);
        (!alternatives.is_empty()).then_some(Self { alternatives })
    }

    /// A read with a single known value
    pub fn exact(value: u16) -> Self {
        Self {
            alternatives: vec![Alternative { value, cost: 0.0 }],
        }
    }

    /// Most likely value
    pub fn best(&self) -> u16 {
        self.alternatives[0].value
    }

    /// Cost of the most likely value
    pub fn cost(&self) -> f32 {
        self.alternatives[0].cost
    }

    /// Whether the best value stands out clearly
    pub fn is_clean(&self) -> bool {
        let best = self.cost();
        best <= MAX_CLEAN_COST
            && self
                .alternatives
                .get(1)
                .is_none_or(|second| second.cost - best >= MIN_MARGIN)
    }

    /// All ranked candidates
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }
}

/// A complete symbol read from one scanline
#[derive(Debug, Clone)]
pub struct SymbolRead {
    /// Scanline index
    pub line: usize,
    /// Characters in codeword order
    pub chars: Vec<CharRead>,
    /// First and last point of the symbol on the line (pixel-center coordinates)
    pub span: (Point, Point),
    /// Line contrast
    pub contrast: f32,
    /// Reading direction in degrees
    pub angle_deg: f32,
}

/// Grammar-specific reader: attempt a symbol starting at run `start`.
///
/// Returns the characters and the index of the first run after the symbol.
pub type ReadAt = fn(runs: &[Run], start: usize) -> Option<(Vec<CharRead>, usize)>;

/// Read a line in both directions and keep the symbol closest to its middle
pub fn read_line(line: &Line, read_at: ReadAt) -> Option<SymbolRead> {
    let mut found: Vec<SymbolRead> = Vec::new();
    for view in [line.clone(), line.reversed()] {
        let runs = view.runs();
        let mut i = 1;
        while i < runs.len() {
            if !runs[i].dark {
                i += 1;
                continue;
            }
            match read_at(runs, i) {
                Some((chars, end)) => {
                    let first = runs[i].start;
                    let last = runs[end - 1].start + runs[end - 1].width;
                    found.push(SymbolRead {
                        line: line.index,
                        chars,
                        span: (view.point_at(first), view.point_at(last)),
                        contrast: view.contrast(),
                        angle_deg: view.angle_deg(),
                    });
                    i = end;
                }
                None => i += 1,
            }
        }
    }
    let mid = line.point_at(line.runs().last().map_or(0.0, |r| (r.start + r.width) / 2.0));
    found.into_iter().min_by(|a, b| {
        let da = midpoint(a.span).distance_squared(&mid);
        let db = midpoint(b.span).distance_squared(&mid);
        da.total_cmp(&db)
    })
}

fn midpoint(span: (Point, Point)) -> Point {
    Point::new((span.0.x + span.1.x) / 2.0, (span.0.y + span.1.y) / 2.0)
}

/// Reads agreed across scanlines
#[derive(Debug, Clone)]
pub struct Consensus {
    /// Voted codewords
    pub codewords: Vec<u16>,
    /// Damage map over the codewords
    pub damage: DamageMap,
    /// Span endpoints of every contributing read
    pub points: Vec<Point>,
    /// Mean line contrast
    pub contrast: f32,
    /// Reading direction of the first contributing read
    pub angle_deg: f32,
}

/// Vote reads position by position.
///
/// Only reads of the most common length take part. `None` when fewer than
/// `min_lines` scanlines produced that length.
pub fn vote(reads: &[SymbolRead], min_lines: usize) -> Option<Consensus> {
    let mut by_len: BTreeMap<usize, Vec<&SymbolRead>> = BTreeMap::new();
    for r in reads {
        by_len.entry(r.chars.len()).or_default().push(r);
    }
    let (_, group) = by_len
        .into_iter()
        .max_by(|(la, a), (lb, b)| distinct_lines(a).cmp(&distinct_lines(b)).then(la.cmp(lb)))?;
    if distinct_lines(&group) < min_lines.max(1) {
        return None;
    }

    let len = group[0].chars.len();
    let mut codewords = Vec::with_capacity(len);
    let mut damage = DamageMap::new();
    for pos in 0..len {
        let mut clean_votes: BTreeMap<u16, usize> = BTreeMap::new();
        let mut cost_sum: BTreeMap<u16, (f32, usize)> = BTreeMap::new();
        for r in &group {
            let ch = &r.chars[pos];
            if ch.is_clean() {
                *clean_votes.entry(ch.best()).or_default() += 1;
            }
            for alt in ch.alternatives() {
                let e = cost_sum.entry(alt.value).or_default();
                e.0 += alt.cost;
                e.1 += 1;
            }
        }
        let n = group.len() as f32;
        let mut ranked: Vec<Alternative> = cost_sum
            .into_iter()
            .map(|(value, (sum, seen))| Alternative {
                value,
                cost: (sum + MISSING_COST * (group.len() - seen) as f32) / n,
            })
            .collect();
        ranked.sort_by(|a, b| a.cost.total_cmp(&b.cost).then(a.value.cmp(&b.value)));
        ranked.truncate(MAX_ALTERNATIVES);

        let mut votes: Vec<(u16, usize)> = clean_votes.into_iter().collect();
        votes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let majority = match votes.as_slice() {
            [] => None,
            [(v, c)] => Some((*v, *c)),
            [(v, c), (_, c2), ..] => (c > c2).then_some((*v, *c)),
        };

        match majority {
            Some((value, count)) => {
                codewords.push(value);
                damage.push(false, count as f32 / n, ranked);
            }
            None => {
                let best = ranked.first().copied()?;
                codewords.push(best.value);
                damage.push(true, 0.5 * (1.0 - best.cost / MISSING_COST), ranked);
            }
        }
    }

    let points = group.iter().flat_map(|r| [r.span.0, r.span.1]).collect();
    let contrast = group.iter().map(|r| r.contrast).sum::<f32>() / group.len() as f32;
    Some(Consensus {
        codewords,
        damage,
        points,
        contrast,
        angle_deg: group[0].angle_deg,
    })
}

fn distinct_lines(reads: &[&SymbolRead]) -> usize {
    let mut lines: Vec<usize> = reads.iter().map(|r| r.line).collect();
    lines.sort_unstable();
    lines.dedup();
    lines.len()
}

/// Shared driver: scan, read, vote and package a linear partial decode
pub fn decode_runs(
    attempt: &DecodeAttempt<'_, '_>,
    read_at: ReadAt,
    min_lines: usize,
) -> Result<PartialDecode, NotThisSymbology> {
    let context = attempt.context();
    let image = context.image();
    let reads: Vec<SymbolRead> = context
        .linear_scan()
        .lines()
        .iter()
        .filter_map(|line| read_line(line, read_at))
        .collect();
    let consensus = vote(&reads, min_lines).ok_or(NotThisSymbology)?;
    trace!(
        symbology = %attempt.symbology(),
        reads = reads.len(),
        flagged = consensus.damage.flagged().len(),
        "linear consensus"
    );

    let edge_points: Vec<Point> = consensus.points.iter().map(|p| p.translate(0.5, 0.5)).collect();
    let bounds = Rect::bounding(&edge_points, image.width(), image.height())
        .unwrap_or_else(|| context.region().bounds());
    Ok(PartialDecode::new(
        attempt.symbology(),
        consensus.codewords,
        consensus.damage,
        Layout::Linear,
        bounds,
        RegionQuality {
            contrast: consensus.contrast,
            rotation_deg: consensus.angle_deg,
        },
    ))
}

/// Scale run widths so they sum to `modules`
pub fn normalized(runs: &[Run], modules: f32) -> Vec<f32> {
    let total: f32 = runs.iter().map(|r| r.width).sum();
    if total <= 0.0 {
        return vec![0.0; runs.len()];
    }
    runs.iter().map(|r| r.width * modules / total).collect()
}

/// L1 distance between measured and ideal element widths
pub fn pattern_cost(measured: &[f32], pattern: &[u8]) -> f32 {
    measured
        .iter()
        .zip(pattern)
        .map(|(m, &p)| (m - p as f32).abs())
        .sum()
}

/// Sum of run widths
pub fn total_width(runs: &[Run]) -> f32 {
    runs.iter().map(|r| r.width).sum()
}

/// Whether every run lies within `[lo, hi]` times the module size
pub fn all_within(runs: &[Run], m: f32, lo: f32, hi: f32) -> bool {
    runs.iter().all(|r| r.width >= lo * m && r.width <= hi * m)
}

/// Scanlines that must agree before a symbol without a check digit is accepted
pub(crate) fn min_lines_for(symbology: Symbology) -> usize {
    if symbology.has_checksum() { 1 } else { 2 }
}
