use std::marker::PhantomData;

use crate::scoring::{gaps, symbols, Score};

pub struct Delegate<ScoreType, Sym, G>
where
    ScoreType: Score,
    Sym: symbols::Scorer<Score = ScoreType>,
    G: gaps::Scorer<Score = ScoreType>,
{
    pub symbols: Sym,
    pub gaps: G,
    score: PhantomData<ScoreType>,
}

impl<ScoreType, Sym, G> Delegate<ScoreType, Sym, G>
where
    ScoreType: Score,
    Sym: symbols::Scorer<Score = ScoreType>,
    G: gaps::Scorer<Score = ScoreType>,
{
    pub fn new(symbols: Sym, gaps: G) -> Self {
        Delegate {
            symbols,
            gaps,
            score: Default::default(),
        }
    }
}

impl<ScoreType, Sym, G> symbols::Scorer for Delegate<ScoreType, Sym, G>
where
    ScoreType: Score,
    Sym: symbols::Scorer<Score = ScoreType>,
    G: gaps::Scorer<Score = ScoreType>,
{
    type Score = ScoreType;

    #[inline(always)]
    fn score(&self, a: u8, b: u8) -> Self::Score {
        self.symbols.score(a, b)
    }

    #[inline(always)]
    fn alphabet(&self) -> &[u8] {
        self.symbols.alphabet()
    }
}

impl<ScoreType, Sym, G> gaps::Scorer for Delegate<ScoreType, Sym, G>
where
    ScoreType: Score,
    Sym: symbols::Scorer<Score = ScoreType>,
    G: gaps::Scorer<Score = ScoreType>,
{
    type Score = ScoreType;

    #[inline(always)]
    fn open(&self) -> Self::Score {
        self.gaps.open()
    }

    #[inline(always)]
    fn extend(&self) -> Self::Score {
        self.gaps.extend()
    }
}

impl<ScoreType, Sym, G> super::Scheme for Delegate<ScoreType, Sym, G>
where
    ScoreType: Score,
    Sym: symbols::Scorer<Score = ScoreType>,
    G: gaps::Scorer<Score = ScoreType>,
{
    type Score = ScoreType;
}
