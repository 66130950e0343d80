use eyre::{ensure, Result};

use phyloalign_core_rs::seq::GAP;

/// One side of a pairwise alignment: one entry per output column, `true`
/// where this side contributed a real character and `false` where it holds a
/// gap. The two masks of an alignment always have equal length and are never
/// both `false` at the same column.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ColumnMask {
    bits: Vec<bool>,
}

impl ColumnMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(columns: usize) -> Self {
        Self {
            bits: Vec::with_capacity(columns),
        }
    }

    pub fn push(&mut self, consumed: bool) {
        self.bits.push(consumed);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of columns that consume a real input character.
    pub fn consumed(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    /// Rebuild the padded string for this side from its ungapped input,
    /// consuming one character per `true` column.
    pub fn expand(&self, ungapped: &[u8]) -> Result<Vec<u8>> {
        ensure!(
            self.consumed() == ungapped.len(),
            "mask consumes {} characters but the input has {}",
            self.consumed(),
            ungapped.len()
        );
        let mut source = ungapped.iter().copied();
        Ok(self
            .bits
            .iter()
            .map(|&bit| if bit { source.next().unwrap() } else { GAP })
            .collect())
    }
}

impl FromIterator<bool> for ColumnMask {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}
