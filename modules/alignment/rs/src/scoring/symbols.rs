use eyre::{ensure, Result};

use phyloalign_core_rs::seq::GAP;

use crate::scoring::Score;

/// Symmetric substitution scoring over an explicit alphabet.
pub trait Scorer {
    type Score: Score;

    fn score(&self, a: u8, b: u8) -> Self::Score;

    fn alphabet(&self) -> &[u8];
}

/// Dense substitution matrix indexed by alphabet position. Symbols outside
/// the alphabet score as the worst entry of the table.
pub struct Matrix<S: Score> {
    alphabet: Vec<u8>,
    index: [i16; 256],
    table: Vec<S>,
    fallback: S,
}

impl<S: Score> Matrix<S> {
    /// Build from a row-major `alphabet.len() x alphabet.len()` table.
    pub fn new(alphabet: &[u8], table: Vec<S>) -> Result<Self> {
        let k = alphabet.len();
        ensure!(k > 0, "empty alphabet");
        ensure!(
            table.len() == k * k,
            "substitution table has {} entries, expected {}",
            table.len(),
            k * k
        );
        let mut index = [-1i16; 256];
        for (pos, &symbol) in alphabet.iter().enumerate() {
            ensure!(
                index[symbol as usize] < 0,
                "duplicate symbol {:?} in alphabet",
                symbol as char
            );
            index[symbol as usize] = pos as i16;
        }
        for row in 0..k {
            for col in 0..row {
                ensure!(
                    table[row * k + col] == table[col * k + row],
                    "substitution table is not symmetric at {:?}/{:?}",
                    alphabet[row] as char,
                    alphabet[col] as char
                );
            }
        }
        let mut fallback = table[0];
        for &entry in &table {
            if entry < fallback {
                fallback = entry;
            }
        }
        Ok(Self {
            alphabet: alphabet.to_vec(),
            index,
            table,
            fallback,
        })
    }

    /// A matrix scoring every identical pair as `matching` and every other
    /// pair as `mismatching`.
    pub fn uniform(alphabet: &[u8], matching: S, mismatching: S) -> Result<Self> {
        let k = alphabet.len();
        let mut table = vec![mismatching; k * k];
        for pos in 0..k {
            table[pos * k + pos] = matching;
        }
        Self::new(alphabet, table)
    }

    /// Match/mismatch matrix over the DNA alphabet.
    pub fn nucleotide(matching: S, mismatching: S) -> Self {
        // The alphabet is fixed and duplicate-free, construction cannot fail.
        Self::uniform(b"ACGT", matching, mismatching).unwrap()
    }
}

impl<S: Score> Scorer for Matrix<S> {
    type Score = S;

    #[inline(always)]
    fn score(&self, a: u8, b: u8) -> S {
        let (ia, ib) = (self.index[a as usize], self.index[b as usize]);
        if ia < 0 || ib < 0 {
            return self.fallback;
        }
        self.table[ia as usize * self.alphabet.len() + ib as usize]
    }

    fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }
}

/// Folds the gap character into an inner scorer: the gap scores zero against
/// every symbol, itself included. Profile columns that contain gaps can then
/// be scored against ordinary columns, with all gap cost accounting left to
/// the affine penalties.
pub struct GapAware<M> {
    inner: M,
    alphabet: Vec<u8>,
}

impl<S: Score, M: Scorer<Score = S>> GapAware<M> {
    pub fn new(inner: M) -> Self {
        let mut alphabet = inner.alphabet().to_vec();
        if !alphabet.contains(&GAP) {
            alphabet.push(GAP);
        }
        Self { inner, alphabet }
    }
}

impl<S: Score, M: Scorer<Score = S>> Scorer for GapAware<M> {
    type Score = S;

    #[inline(always)]
    fn score(&self, a: u8, b: u8) -> S {
        if a == GAP || b == GAP {
            return S::zero();
        }
        self.inner.score(a, b)
    }

    fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }
}
