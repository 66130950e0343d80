use eyre::{ensure, Result};
use itertools::Itertools;

use phyloalign_alignment_rs::pairwise::Engine;
use phyloalign_alignment_rs::profile::Profile;
use phyloalign_alignment_rs::scoring::Scheme;
use phyloalign_alignment_rs::Score;
use phyloalign_core_rs::progress::{CancellationToken, Monitor, Progress};
use phyloalign_core_rs::seq::Sequence;

/// Pairwise distance matrix over score-only alignments, the usual input to
/// guide-tree construction. The distance between two sequences is
/// `1 - score / (max_len * best_self_score)` clamped to `[0, 1]`.
///
/// Each pair runs as one monitor section weighted by its `n * m` cell count,
/// so progress reflects actual work. Returns `None` on cancellation.
pub fn distance_matrix<S, Sch>(
    engine: &mut Engine<S, Sch>,
    sequences: &[Sequence],
    sink: &mut dyn Progress,
    token: CancellationToken,
) -> Result<Option<Vec<Vec<f64>>>>
where
    S: Score,
    Sch: Scheme<Score = S>,
{
    ensure!(sequences.len() >= 2, "a distance matrix needs at least two sequences");

    let best_self = engine
        .scheme()
        .alphabet()
        .iter()
        .map(|&symbol| engine.scheme().score(symbol, symbol))
        .fold(S::neg_infinity(), |best, score| if score > best { score } else { best });
    let best_self = best_self.to_f64().unwrap_or(0.0);
    ensure!(
        best_self > 0.0,
        "the substitution matrix has no positive self score to normalize by"
    );

    let stripped: Vec<Vec<u8>> = sequences
        .iter()
        .map(Sequence::checked_ungapped)
        .collect::<Result<_>>()?;

    let count = stripped.len();
    let total: f64 = (0..count)
        .tuple_combinations()
        .map(|(i, j)| (stripped[i].len() * stripped[j].len()) as f64)
        .sum();
    let mut monitor = Monitor::new(sink, token, total);

    let mut matrix = vec![vec![0.0; count]; count];
    for (i, j) in (0..count).tuple_combinations() {
        let a = Profile::single(0, &stripped[i], 2)?;
        let b = Profile::single(1, &stripped[j], 2)?;
        monitor.begin_section((a.len() * b.len()) as f64);
        let score = match engine.score_only(&a, &b, &mut monitor)? {
            None => return Ok(None),
            Some(score) => score.to_f64().unwrap_or(f64::NEG_INFINITY),
        };
        monitor.end_section();

        let longest = a.len().max(b.len()) as f64;
        let distance = (1.0 - score / (longest * best_self)).clamp(0.0, 1.0);
        matrix[i][j] = distance;
        matrix[j][i] = distance;
    }
    Ok(Some(matrix))
}
