use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use eyre::{ensure, Result};

/// The gap character used in padded alignment strings.
pub const GAP: u8 = b'-';

/// Rough sequence class, used by callers to pick default scoring and
/// distance models. The alignment engine itself never inspects it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Kind {
    Nucleotide,
    Protein,
}

/// A named biological sequence.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Getters, Dissolve, Constructor)]
pub struct Sequence {
    name: String,
    residues: Vec<u8>,
    kind: Kind,
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Residues with any gap characters stripped.
    pub fn ungapped(&self) -> Vec<u8> {
        self.residues.iter().copied().filter(|&c| c != GAP).collect()
    }

    /// Non-empty, gap-free view required when a sequence enters an
    /// alignment.
    pub fn checked_ungapped(&self) -> Result<Vec<u8>> {
        let residues = self.ungapped();
        ensure!(
            !residues.is_empty(),
            "sequence {:?} has no residues once gaps are stripped",
            self.name
        );
        Ok(residues)
    }
}
