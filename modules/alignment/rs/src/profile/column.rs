use eyre::{eyre, Result};
use num::Zero;

use phyloalign_core_rs::seq::GAP;

use crate::scoring::symbols;
use crate::Score;

#[inline(always)]
fn cast<S: Score>(value: u64) -> S {
    // u64 counts always fit an IEEE float (possibly rounded).
    S::from(value).unwrap()
}

/// One alignment column: a small histogram of the characters the member
/// sequences hold at that position. Counts are positive, each character
/// appears at most once and `total` is the sum of all counts.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ProfileColumn {
    entries: Vec<(u8, u32)>,
    total: u32,
}

impl ProfileColumn {
    /// Column holding a single occurrence of one character.
    pub fn single(symbol: u8) -> Self {
        Self {
            entries: vec![(symbol, 1)],
            total: 1,
        }
    }

    /// Column of `count` gap characters.
    pub fn gaps(count: u32) -> Self {
        debug_assert!(count > 0);
        Self {
            entries: vec![(GAP, count)],
            total: count,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn occurrences(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn add(&mut self, symbol: u8, count: u32) {
        debug_assert!(count > 0);
        match self.entries.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, existing)) => *existing += count,
            None => self.entries.push((symbol, count)),
        }
        self.total += count;
    }

    /// Drop one occurrence of `symbol`. Removing the last occurrence drops
    /// the character from the histogram.
    pub fn remove(&mut self, symbol: u8) -> Result<()> {
        let pos = self
            .entries
            .iter()
            .position(|(s, _)| *s == symbol)
            .ok_or_else(|| eyre!("character {:?} is not present in the column", symbol as char))?;
        if self.entries[pos].1 == 1 {
            self.entries.remove(pos);
        } else {
            self.entries[pos].1 -= 1;
        }
        self.total -= 1;
        Ok(())
    }

    /// Fold another column's occurrences into this one.
    pub fn merge(&mut self, other: &ProfileColumn) {
        for (symbol, count) in other.occurrences() {
            self.add(symbol, count);
        }
    }

    /// True when every occurrence is the gap character.
    pub fn is_all_gap(&self) -> bool {
        self.total > 0 && matches!(self.entries.as_slice(), [(GAP, _)])
    }

    /// Proportion of occurrences that are gaps. Not defined for all-gap
    /// columns, which never survive profile trimming.
    pub fn gap_fraction<S: Score>(&self) -> S {
        debug_assert!(!self.is_all_gap() && self.total > 0);
        let gaps = self
            .entries
            .iter()
            .find(|(s, _)| *s == GAP)
            .map(|(_, count)| *count)
            .unwrap_or(0);
        cast::<S>(gaps as u64) / cast::<S>(self.total as u64)
    }

    /// Count-weighted average substitution score over all character
    /// combinations of the two columns. Two single-occurrence columns
    /// short-circuit to a direct matrix lookup.
    pub fn expected_score<Sym>(&self, other: &ProfileColumn, scheme: &Sym) -> Sym::Score
    where
        Sym: symbols::Scorer,
    {
        debug_assert!(self.total > 0 && other.total > 0);
        if self.total == 1 && other.total == 1 {
            return scheme.score(self.entries[0].0, other.entries[0].0);
        }
        let mut sum = Sym::Score::zero();
        for (a, ka) in self.occurrences() {
            for (b, kb) in other.occurrences() {
                sum = sum + cast::<Sym::Score>(ka as u64 * kb as u64) * scheme.score(a, b);
            }
        }
        sum / cast::<Sym::Score>(self.total as u64 * other.total as u64)
    }
}
