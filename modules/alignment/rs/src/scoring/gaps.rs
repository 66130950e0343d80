use crate::scoring::Score;

/// Affine gap penalty contract. Both values are non-negative and are
/// subtracted from the running alignment score: a gap run of length `k`
/// costs `open + (k - 1) * extend`.
pub trait Scorer {
    type Score: Score;

    fn open(&self) -> Self::Score;
    fn extend(&self) -> Self::Score;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine<S: Score> {
    pub open: S,
    pub extend: S,
}

impl<S: Score> Scorer for Affine<S> {
    type Score = S;

    #[inline(always)]
    fn open(&self) -> Self::Score {
        self.open
    }

    #[inline(always)]
    fn extend(&self) -> Self::Score {
        self.extend
    }
}
