use eyre::{ensure, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use phyloalign_alignment_rs::pairwise::Engine;
use phyloalign_alignment_rs::profile::Profile;
use phyloalign_alignment_rs::scoring::Scheme;
use phyloalign_alignment_rs::Score;
use phyloalign_core_rs::progress::{CancellationToken, Monitor, Progress};

/// Shuffle-based Monte Carlo estimate of alignment significance: the
/// probability that two sequences with the same composition score at least
/// as well as the observed pair. Estimated as `(hits + 1) / (trials + 1)`;
/// smaller is more significant. Returns `None` on cancellation.
pub fn significance<S, Sch, R>(
    engine: &mut Engine<S, Sch>,
    a: &[u8],
    b: &[u8],
    trials: usize,
    rng: &mut R,
    sink: &mut dyn Progress,
    token: CancellationToken,
) -> Result<Option<f64>>
where
    S: Score,
    Sch: Scheme<Score = S>,
    R: Rng,
{
    ensure!(trials > 0, "at least one shuffle trial is required");

    let mut monitor = Monitor::new(sink, token, (trials + 1) as f64);
    let profile_a = Profile::single(0, a, 2)?;
    let profile_b = Profile::single(1, b, 2)?;

    monitor.begin_section(1.0);
    let observed = match engine.score_only(&profile_a, &profile_b, &mut monitor)? {
        None => return Ok(None),
        Some(score) => score,
    };
    monitor.end_section();

    let mut shuffled_a = a.to_vec();
    let mut shuffled_b = b.to_vec();
    let mut hits = 0usize;
    for _ in 0..trials {
        if monitor.is_cancelled() {
            return Ok(None);
        }
        shuffled_a.shuffle(rng);
        shuffled_b.shuffle(rng);
        let pa = Profile::single(0, &shuffled_a, 2)?;
        let pb = Profile::single(1, &shuffled_b, 2)?;
        monitor.begin_section(1.0);
        let score = match engine.score_only(&pa, &pb, &mut monitor)? {
            None => return Ok(None),
            Some(score) => score,
        };
        monitor.end_section();
        if score >= observed {
            hits += 1;
        }
    }
    Ok(Some((hits + 1) as f64 / (trials + 1) as f64))
}
