pub use delegate::Delegate;

pub use crate::Score;

mod delegate;
pub mod gaps;
pub mod symbols;

/// A complete scoring model for one alignment: symbol substitution scores
/// plus affine gap penalties.
pub trait Scheme:
    gaps::Scorer<Score = <Self as Scheme>::Score>
    + symbols::Scorer<Score = <Self as Scheme>::Score>
{
    type Score: Score;
}

pub fn compose<ScoreType, Sym, G>(symbols: Sym, gaps: G) -> Delegate<ScoreType, Sym, G>
where
    ScoreType: Score,
    Sym: symbols::Scorer<Score = ScoreType>,
    G: gaps::Scorer<Score = ScoreType>,
{
    Delegate::new(symbols, gaps)
}
