//! Reed-Solomon over GF(256) as used by QR: field polynomial 0x11D, generator
//! roots α^0..α^(n-1), codeword `block[0]` is the highest-degree coefficient.
//!
//! Decoding handles errors and erasures together: Berlekamp-Massey is seeded
//! with the erasure locator, roots come from a Chien search and magnitudes
//! from Forney's formula.

use thiserror::Error;

/// GF(256) arithmetic with log/antilog tables
pub struct Gf256;

const EXP: [u8; 512] = build_exp();
const LOG: [u8; 256] = build_log();

const fn build_exp() -> [u8; 512] {
    let mut t = [0u8; 512];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 512 {
        t[i] = x as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= 0x11D;
        }
        i += 1;
    }
    t
}

const fn build_log() -> [u8; 256] {
    let mut t = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        t[EXP[i] as usize] = i as u8;
        i += 1;
    }
    t
}

impl Gf256 {
    /// α^n
    pub fn exp(n: usize) -> u8 {
        EXP[n % 255]
    }

    /// Product
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
    }

    /// Multiplicative inverse; zero has none and maps to zero
    pub fn inv(a: u8) -> u8 {
        if a == 0 {
            return 0;
        }
        EXP[255 - LOG[a as usize] as usize]
    }

    /// Quotient `a / b` (zero when `b` is zero)
    pub fn div(a: u8, b: u8) -> u8 {
        Self::mul(a, Self::inv(b))
    }
}

/// Why a block could not be corrected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsError {
    /// More erasures than error-correction codewords
    #[error("{erasures} erasures exceed {capacity} check codewords")]
    TooManyErasures {
        /// Erasures requested
        erasures: usize,
        /// Check codewords in the block
        capacity: usize,
    },
    /// Damage beyond what the check codewords can locate
    #[error("block is uncorrectable")]
    Uncorrectable,
}

/// What a successful decode did to the block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correction {
    /// Positions fixed that were not given as erasures
    pub errors: usize,
    /// Erasures given to the decoder
    pub erasures: usize,
    /// Positions whose value changed
    pub changed: Vec<usize>,
}

/// Codec for one check-codeword count
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    ecc_len: usize,
    /// Generator polynomial, highest degree first, monic
    generator: Vec<u8>,
}

/// Evaluate an ascending-order polynomial at `x`
fn eval_ascending(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0, |acc, &c| Gf256::mul(acc, x) ^ c)
}

impl ReedSolomon {
    /// Codec appending `ecc_len` check codewords
    pub fn new(ecc_len: usize) -> Self {
        let mut generator = vec![1u8];
        for i in 0..ecc_len {
            // multiply by (x - α^i)
            let root = Gf256::exp(i);
            let mut next = vec![0u8; generator.len() + 1];
            for (j, &g) in generator.iter().enumerate() {
                next[j] ^= g;
                next[j + 1] ^= Gf256::mul(g, root);
            }
            generator = next;
        }
        Self { ecc_len, generator }
    }

    /// Check codewords in a block
    pub fn ecc_len(&self) -> usize {
        self.ecc_len
    }

    /// Check codewords for `data`
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut rem = vec![0u8; self.ecc_len];
        for &d in data {
            let factor = d ^ rem.first().copied().unwrap_or(0);
            rem.rotate_left(1);
            if let Some(last) = rem.last_mut() {
                *last = 0;
            }
            for (r, &g) in rem.iter_mut().zip(&self.generator[1..]) {
                *r ^= Gf256::mul(g, factor);
            }
        }
        rem
    }

    /// Syndromes `S_i = r(α^i)`
    pub fn syndromes(&self, block: &[u8]) -> Vec<u8> {
        (0..self.ecc_len)
            .map(|i| {
                let x = Gf256::exp(i);
                block.iter().fold(0, |acc, &c| Gf256::mul(acc, x) ^ c)
            })
            .collect()
    }

    /// True when the block is a codeword
    pub fn is_codeword(&self, block: &[u8]) -> bool {
        self.syndromes(block).iter().all(|&s| s == 0)
    }

    /// Correct `block` in place, treating `erasures` as known-bad positions.
    ///
    /// Succeeds only when `2 * errors + erasures <= ecc_len` and the result
    /// verifies; the block is left untouched on failure.
    pub fn decode(&self, block: &mut [u8], erasures: &[usize]) -> Result<Correction, RsError> {
        let n = block.len();
        let mut erasures: Vec<usize> = erasures.iter().copied().filter(|&p| p < n).collect();
        erasures.sort_unstable();
        erasures.dedup();
        if erasures.len() > self.ecc_len {
            return Err(RsError::TooManyErasures {
                erasures: erasures.len(),
                capacity: self.ecc_len,
            });
        }

        let syndromes = self.syndromes(block);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok(Correction {
                errors: 0,
                erasures: erasures.len(),
                changed: Vec::new(),
            });
        }

        let locator_of = |pos: usize| Gf256::exp(n - 1 - pos);

        // erasure locator Γ(x) = Π (1 + X_k x), ascending order
        let mut gamma = vec![1u8];
        for &p in &erasures {
            let x = locator_of(p);
            let mut next = vec![0u8; gamma.len() + 1];
            for (j, &g) in gamma.iter().enumerate() {
                next[j] ^= g;
                next[j + 1] ^= Gf256::mul(g, x);
            }
            gamma = next;
        }

        // Berlekamp-Massey continuing from Γ
        let e = erasures.len();
        let mut lambda = gamma.clone();
        let mut prev = gamma;
        let mut l = e;
        for k in e..self.ecc_len {
            let delta = lambda
                .iter()
                .enumerate()
                .filter(|&(j, _)| j <= k)
                .fold(0u8, |acc, (j, &c)| acc ^ Gf256::mul(c, syndromes[k - j]));
            prev.insert(0, 0);
            if delta == 0 {
                continue;
            }
            let mut next = lambda.clone();
            if next.len() < prev.len() {
                next.resize(prev.len(), 0);
            }
            for (t, &b) in next.iter_mut().zip(&prev) {
                *t ^= Gf256::mul(delta, b);
            }
            if 2 * l <= k + e {
                let scale = Gf256::inv(delta);
                prev = lambda.iter().map(|&c| Gf256::mul(c, scale)).collect();
                l = k + 1 + e - l;
            }
            lambda = next;
        }
        while lambda.len() > 1 && lambda.last() == Some(&0) {
            lambda.pop();
        }
        let degree = lambda.len() - 1;
        if degree != l || 2 * l > self.ecc_len + e {
            return Err(RsError::Uncorrectable);
        }

        // Chien search over the block's positions
        let positions: Vec<usize> = (0..n)
            .filter(|&p| eval_ascending(&lambda, Gf256::inv(locator_of(p))) == 0)
            .collect();
        if positions.len() != degree {
            return Err(RsError::Uncorrectable);
        }

        // Ω(x) = S(x) Λ(x) mod x^ecc_len
        let mut omega = vec![0u8; self.ecc_len];
        for (i, &s) in syndromes.iter().enumerate() {
            for (j, &c) in lambda.iter().enumerate() {
                if i + j < self.ecc_len {
                    omega[i + j] ^= Gf256::mul(s, c);
                }
            }
        }
        // formal derivative keeps odd-degree terms
        let derivative: Vec<u8> = lambda
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, &c)| if i % 2 == 1 { c } else { 0 })
            .collect();

        let mut fixed = block.to_vec();
        let mut changed = Vec::new();
        for &p in &positions {
            let x = locator_of(p);
            let x_inv = Gf256::inv(x);
            let denom = eval_ascending(&derivative, x_inv);
            if denom == 0 {
                return Err(RsError::Uncorrectable);
            }
            let magnitude = Gf256::mul(x, Gf256::div(eval_ascending(&omega, x_inv), denom));
            if magnitude != 0 {
                fixed[p] ^= magnitude;
                changed.push(p);
            }
        }
        if !self.is_codeword(&fixed) {
            return Err(RsError::Uncorrectable);
        }
        block.copy_from_slice(&fixed);
        let errors = changed
            .iter()
            .filter(|p| erasures.binary_search(p).is_err())
            .count();
        Ok(Correction {
            errors,
            erasures: e,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codeword(data: &[u8], ecc: usize) -> Vec<u8> {
        let rs = ReedSolomon::new(ecc);
        let mut block = data.to_vec();
        block.extend(rs.encode(data));
        block
    }

    #[test]
    fn test_field_basics() {
        assert_eq!(Gf256::exp(8), 0x1D);
        assert_eq!(Gf256::mul(2, 0x80), 0x1D);
        for a in 1..=255u8 {
            assert_eq!(Gf256::mul(a, Gf256::inv(a)), 1);
        }
        assert_eq!(Gf256::div(0, 7), 0);
    }

    #[test]
    fn test_known_encoding() {
        // "HELLO WORLD" 1-M data codewords and their published check codewords
        let data = [
            0x20, 0x5B, 0x0B, 0x78, 0xD1, 0x72, 0xDC, 0x4D, 0x43, 0x40, 0xEC, 0x11, 0xEC, 0x11,
            0xEC, 0x11,
        ];
        let ecc = ReedSolomon::new(10).encode(&data);
        assert_eq!(ecc, vec![0xC4, 0x23, 0x27, 0x77, 0xEB, 0xD7, 0xE7, 0xE2, 0x5D, 0x17]);
    }

    #[test]
    fn test_errors_only() {
        let data: Vec<u8> = (0..20).map(|i| (i * 13 + 7) as u8).collect();
        let clean = codeword(&data, 10);
        let mut block = clean.clone();
        for &p in &[0, 7, 19, 25, 29] {
            block[p] ^= 0xA5;
        }
        let c = ReedSolomon::new(10).decode(&mut block, &[]).unwrap();
        assert_eq!(block, clean);
        assert_eq!(c.errors, 5);
        assert_eq!(c.changed.len(), 5);
    }

    #[test]
    fn test_errors_and_erasures() {
        let data: Vec<u8> = (0..16).map(|i| (i * 31) as u8).collect();
        let clean = codeword(&data, 28);
        let mut block = clean.clone();
        // 20 erasures (one of them actually intact) plus 4 errors: 20 + 8 = 28
        let erasures: Vec<usize> = (10..30).collect();
        for &p in &erasures[1..] {
            block[p] = 0xFF ^ clean[p];
        }
        for &p in &[0, 3, 35, 43] {
            block[p] ^= 0x3C;
        }
        let c = ReedSolomon::new(28).decode(&mut block, &erasures).unwrap();
        assert_eq!(block, clean);
        assert_eq!(c.erasures, 20);
        assert_eq!(c.errors, 4);
        assert_eq!(c.changed.len(), 23);
    }

    #[test]
    fn test_beyond_capacity_fails_untouched() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let clean = codeword(&data, 4);
        let mut block = clean.clone();
        for p in 0..3 {
            block[p] ^= 0x11;
        }
        let damaged = block.clone();
        let result = ReedSolomon::new(4).decode(&mut block, &[]);
        if result.is_ok() {
            // a miscorrection must still land on a valid codeword
            assert!(ReedSolomon::new(4).is_codeword(&block));
            assert_ne!(block, clean);
        } else {
            assert_eq!(block, damaged);
        }
        assert!(matches!(
            ReedSolomon::new(4).decode(&mut block, &[0, 1, 2, 3, 4]),
            Err(RsError::TooManyErasures { erasures: 5, capacity: 4 })
        ));
    }

    #[test]
    fn test_clean_block() {
        let mut block = codeword(&[9, 8, 7], 6);
        let c = ReedSolomon::new(6).decode(&mut block, &[1]).unwrap();
        assert_eq!(c.errors, 0);
        assert!(c.changed.is_empty());
    }
}
