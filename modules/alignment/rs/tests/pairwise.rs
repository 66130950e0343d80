use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use phyloalign_alignment_rs::mask::ColumnMask;
use phyloalign_alignment_rs::pairwise::{Engine, FreeEndGaps, PairAlignment};
use phyloalign_alignment_rs::profile::Profile;
use phyloalign_alignment_rs::scoring::{self, gaps, symbols};
use phyloalign_core_rs::progress::{CancellationToken, Monitor, Progress, Silent};

type Scheme = scoring::Delegate<f64, symbols::GapAware<symbols::Matrix<f64>>, gaps::Affine<f64>>;
type TestEngine = Engine<f64, Scheme>;

fn engine(matching: f64, mismatching: f64, open: f64, extend: f64) -> TestEngine {
    Engine::new(scoring::compose(
        symbols::GapAware::new(symbols::Matrix::nucleotide(matching, mismatching)),
        gaps::Affine { open, extend },
    ))
}

fn run(engine: &mut TestEngine, a: &Profile, b: &Profile) -> Option<PairAlignment<f64>> {
    let mut sink = Silent;
    let mut monitor = Monitor::new(&mut sink, CancellationToken::new(), 1.0);
    engine.align(a, b, &mut monitor).unwrap()
}

fn run_sequences(engine: &mut TestEngine, a: &[u8], b: &[u8]) -> (f64, Vec<u8>, Vec<u8>) {
    let alignment = {
        let mut sink = Silent;
        let mut monitor = Monitor::new(&mut sink, CancellationToken::new(), 1.0);
        engine.align_sequences(a, b, &mut monitor).unwrap().unwrap()
    };
    let first = alignment.first().expand(a).unwrap();
    let second = alignment.second().expand(b).unwrap();
    (*alignment.score(), first, second)
}

fn score_of(engine: &mut TestEngine, a: &Profile, b: &Profile) -> f64 {
    let mut sink = Silent;
    let mut monitor = Monitor::new(&mut sink, CancellationToken::new(), 1.0);
    engine.score_only(a, b, &mut monitor).unwrap().unwrap()
}

/// Straightforward quadratic-space affine DP over profiles, written
/// independently of the engine and sharing its tie order. The primary
/// correctness oracle.
mod reference {
    use super::*;
    use phyloalign_alignment_rs::scoring::symbols::Scorer;

    const D: usize = 0;
    const GS: usize = 1;
    const GF: usize = 2;

    pub struct Outcome {
        pub score: f64,
        pub first: Vec<bool>,
        pub second: Vec<bool>,
    }

    fn pick(candidates: [f64; 3]) -> (f64, usize) {
        let mut best = candidates[0];
        let mut index = 0;
        if candidates[1] > best {
            best = candidates[1];
            index = 1;
        }
        if candidates[2] > best {
            best = candidates[2];
            index = 2;
        }
        (best, index)
    }

    pub fn align<Sym: Scorer<Score = f64>>(
        a: &Profile,
        b: &Profile,
        scheme: &Sym,
        open: f64,
        extend: f64,
        free: (bool, bool),
    ) -> Outcome {
        let (n, m) = (a.len(), b.len());
        let gfa: Vec<f64> = a.columns().iter().map(|c| c.gap_fraction::<f64>()).collect();
        let gfb: Vec<f64> = b.columns().iter().map(|c| c.gap_fraction::<f64>()).collect();

        let cost_second = |gi: usize, gj: usize| -> (f64, f64) {
            if free.1 && (gj == 0 || gj == m) {
                return (0.0, 0.0);
            }
            (open - extend * gfa[gi], extend * (1.0 - gfa[gi]))
        };
        let cost_first = |gi: usize, gj: usize| -> (f64, f64) {
            if free.0 && (gi == 0 || gi == n) {
                return (0.0, 0.0);
            }
            (open - extend * gfb[gj], extend * (1.0 - gfb[gj]))
        };

        let neg = f64::NEG_INFINITY;
        let mut score = vec![[neg; 3]; (n + 1) * (m + 1)];
        let mut back = vec![[D; 3]; (n + 1) * (m + 1)];
        let width = m + 1;
        score[0][D] = 0.0;

        for j in 1..=m {
            let (o, e) = cost_first(0, j - 1);
            let (value, which) = pick([
                score[j - 1][D] - o,
                score[j - 1][GF] - e,
                score[j - 1][GS] - o,
            ]);
            score[j][GF] = value;
            back[j][GF] = [D, GF, GS][which];
        }
        for i in 1..=n {
            let (at, up) = (i * width, (i - 1) * width);
            let (o, e) = cost_second(i - 1, 0);
            let (value, which) = pick([
                score[up][D] - o,
                score[up][GS] - e,
                score[up][GF] - o,
            ]);
            score[at][GS] = value;
            back[at][GS] = [D, GS, GF][which];

            for j in 1..=m {
                let sub = a.columns()[i - 1].expected_score(&b.columns()[j - 1], scheme);
                let (so, se) = cost_second(i - 1, j);
                let (fo, fe) = cost_first(i, j - 1);

                let (value, which) = pick([
                    score[up + j - 1][D],
                    score[up + j - 1][GS],
                    score[up + j - 1][GF],
                ]);
                score[at + j][D] = value + sub;
                back[at + j][D] = [D, GS, GF][which];

                let (value, which) = pick([
                    score[up + j][D] - so,
                    score[up + j][GS] - se,
                    score[up + j][GF] - so,
                ]);
                score[at + j][GS] = value;
                back[at + j][GS] = [D, GS, GF][which];

                let (value, which) = pick([
                    score[at + j - 1][D] - fo,
                    score[at + j - 1][GF] - fe,
                    score[at + j - 1][GS] - fo,
                ]);
                score[at + j][GF] = value;
                back[at + j][GF] = [D, GF, GS][which];
            }
        }

        let last = n * width + m;
        let (final_score, which) = pick([score[last][D], score[last][GS], score[last][GF]]);
        let mut state = [D, GS, GF][which];
        let (mut i, mut j) = (n, m);
        let mut steps = Vec::new();
        while i > 0 || j > 0 {
            steps.push(state);
            let predecessor = back[i * width + j][state];
            match state {
                D => {
                    i -= 1;
                    j -= 1;
                }
                GS => i -= 1,
                _ => j -= 1,
            }
            state = predecessor;
        }
        steps.reverse();
        Outcome {
            score: final_score,
            first: steps.iter().map(|&s| s != GF).collect(),
            second: steps.iter().map(|&s| s != GS).collect(),
        }
    }

    /// Recompute the score of a finished alignment by walking its column
    /// masks with the same cost model. Independent of both DP traversals.
    pub fn rescore<Sym: Scorer<Score = f64>>(
        a: &Profile,
        b: &Profile,
        scheme: &Sym,
        open: f64,
        extend: f64,
        free: (bool, bool),
        first: &ColumnMask,
        second: &ColumnMask,
    ) -> f64 {
        let (n, m) = (a.len(), b.len());
        let gfa: Vec<f64> = a.columns().iter().map(|c| c.gap_fraction::<f64>()).collect();
        let gfb: Vec<f64> = b.columns().iter().map(|c| c.gap_fraction::<f64>()).collect();

        let (mut ai, mut bi) = (0usize, 0usize);
        let mut previous = D;
        let mut total = 0.0;
        for (ca, cb) in first.iter().zip(second.iter()) {
            match (ca, cb) {
                (true, true) => {
                    total += a.columns()[ai].expected_score(&b.columns()[bi], scheme);
                    ai += 1;
                    bi += 1;
                    previous = D;
                }
                (true, false) => {
                    if !(free.1 && (bi == 0 || bi == m)) {
                        let gf = gfa[ai];
                        total -= if previous == GS {
                            extend * (1.0 - gf)
                        } else {
                            open - extend * gf
                        };
                    }
                    ai += 1;
                    previous = GS;
                }
                (false, true) => {
                    if !(free.0 && (ai == 0 || ai == n)) {
                        let gf = gfb[bi];
                        total -= if previous == GF {
                            extend * (1.0 - gf)
                        } else {
                            open - extend * gf
                        };
                    }
                    bi += 1;
                    previous = GF;
                }
                (false, false) => panic!("gap on both sides of a column"),
            }
        }
        assert_eq!((ai, bi), (a.len(), b.len()));
        total
    }
}

struct Workload<'a> {
    seq1: &'a [u8],
    seq2: &'a [u8],
    free: (bool, bool),
    score: f64,
    first: &'a [u8],
    second: &'a [u8],
}

fn ensure(engine: &mut TestEngine, w: &Workload<'_>) {
    engine.with_free_ends(FreeEndGaps::new(w.free.0, w.free.1));
    let (score, first, second) = run_sequences(engine, w.seq1, w.seq2);
    assert_eq!(score, w.score, "score for {:?} vs {:?}", w.seq1, w.seq2);
    assert_eq!(first, w.first);
    assert_eq!(second, w.second);

    // Swapping the inputs (and the free-end flags) preserves the score.
    engine.with_free_ends(FreeEndGaps::new(w.free.1, w.free.0));
    let (mirrored, _, _) = run_sequences(engine, w.seq2, w.seq1);
    assert_eq!(mirrored, w.score);
}

#[test]
fn workload_table() {
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    let workload = [
        Workload {
            seq1: b"AAAAGGGGTTTT",
            seq2: b"AAAATTTT",
            free: (false, false),
            score: 60.0,
            first: b"AAAAGGGGTTTT",
            second: b"AAAA----TTTT",
        },
        Workload {
            seq1: b"ACGT",
            seq2: b"ACGT",
            free: (false, false),
            score: 40.0,
            first: b"ACGT",
            second: b"ACGT",
        },
        Workload {
            seq1: b"GATTACA",
            seq2: b"GCATGCT",
            free: (false, false),
            score: 6.0,
            first: b"G-ATTACA",
            second: b"GCA-TGCT",
        },
        Workload {
            seq1: b"A",
            seq2: b"G",
            free: (false, false),
            score: -9.0,
            first: b"A",
            second: b"G",
        },
        Workload {
            seq1: b"ACACACTA",
            seq2: b"AGCACACA",
            free: (false, false),
            score: 54.0,
            first: b"A-CACACTA",
            second: b"AGCACAC-A",
        },
        Workload {
            seq1: b"TTTTACGTTTTT",
            seq2: b"ACGT",
            free: (true, true),
            score: 40.0,
            first: b"TTTTACGTTTTT",
            second: b"----ACGT----",
        },
        Workload {
            seq1: b"ACGT",
            seq2: b"TTTTACGTTTTT",
            free: (true, true),
            score: 40.0,
            first: b"----ACGT----",
            second: b"TTTTACGTTTTT",
        },
    ];
    for w in &workload {
        ensure(&mut engine, w);
    }

    engine.with_scheme(scoring::compose(
        symbols::GapAware::new(symbols::Matrix::nucleotide(5.0, -4.0)),
        gaps::Affine {
            open: 12.0,
            extend: 1.0,
        },
    ));
    let workload = [
        Workload {
            seq1: b"GCGCGTGCGCGGAAGGAGCCAAGG",
            seq2: b"GCGTTGCGCGGAAGGGACCAAGG",
            free: (false, false),
            score: 76.0,
            first: b"GCGCGTGCGCGGAAGGAGCCAAGG",
            second: b"GCG-TTGCGCGGAAGGGACCAAGG",
        },
        // Free end gaps on the first side do not pay for the second side's
        // leading run; on the second side they do.
        Workload {
            seq1: b"CCCCCCCCCCGGGGGGGGGG",
            seq2: b"GGGGGGGGGG",
            free: (true, false),
            score: 29.0,
            first: b"CCCCCCCCCCGGGGGGGGGG",
            second: b"----------GGGGGGGGGG",
        },
        Workload {
            seq1: b"CCCCCCCCCCGGGGGGGGGG",
            seq2: b"GGGGGGGGGG",
            free: (false, true),
            score: 50.0,
            first: b"CCCCCCCCCCGGGGGGGGGG",
            second: b"----------GGGGGGGGGG",
        },
    ];
    for w in &workload {
        ensure(&mut engine, w);
    }
}

#[test]
fn golden_regression() {
    let mut engine = engine(10.0, -9.0, 8.0, 8.0);
    ensure(
        &mut engine,
        &Workload {
            seq1: b"ACGTAGCTACG",
            seq2: b"GCTAGCTAGCTG",
            free: (false, false),
            score: 57.0,
            first: b"ACGTAGCTA-C-G",
            second: b"GC-TAGCTAGCTG",
        },
    );
}

#[test]
fn free_end_gaps_leave_identical_sequences_untouched() {
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    engine.with_free_ends(FreeEndGaps::new(true, true));
    let (score, first, second) = run_sequences(&mut engine, b"ACGTACGTAA", b"ACGTACGTAA");
    assert_eq!(score, 100.0);
    assert_eq!(first, b"ACGTACGTAA");
    assert_eq!(second, b"ACGTACGTAA");
}

fn random_sequence(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
}

#[test]
fn linear_space_matches_quadratic_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    let scheme = symbols::GapAware::new(symbols::Matrix::nucleotide(10.0, -9.0));

    for trial in 0..80 {
        let len_a = rng.random_range(1..=40);
        let len_b = rng.random_range(1..=40);
        let a = random_sequence(&mut rng, len_a);
        let b = random_sequence(&mut rng, len_b);
        let free = (rng.random_bool(0.3), rng.random_bool(0.3));
        engine.with_free_ends(FreeEndGaps::new(free.0, free.1));

        let pa = Profile::single(0, &a, 2).unwrap();
        let pb = Profile::single(1, &b, 2).unwrap();
        let alignment = run(&mut engine, &pa, &pb).unwrap();
        let oracle = reference::align(&pa, &pb, &scheme, 8.0, 4.0, free);

        assert_eq!(*alignment.score(), oracle.score, "trial {}", trial);

        // The masks must account for every input character exactly once and
        // their path must cost exactly the reported score.
        assert_eq!(alignment.first().consumed(), a.len());
        assert_eq!(alignment.second().consumed(), b.len());
        assert_eq!(alignment.first().len(), alignment.second().len());
        assert!(alignment
            .first()
            .iter()
            .zip(alignment.second().iter())
            .all(|(x, y)| x || y));
        let rescored = reference::rescore(
            &pa,
            &pb,
            &scheme,
            8.0,
            4.0,
            free,
            alignment.first(),
            alignment.second(),
        );
        assert_eq!(rescored, *alignment.score(), "trial {}", trial);

        // The oracle's own path costs its own score too.
        let oracle_first: ColumnMask = oracle.first.iter().copied().collect();
        let oracle_second: ColumnMask = oracle.second.iter().copied().collect();
        let oracle_rescored = reference::rescore(
            &pa,
            &pb,
            &scheme,
            8.0,
            4.0,
            free,
            &oracle_first,
            &oracle_second,
        );
        assert_eq!(oracle_rescored, oracle.score, "trial {}", trial);

        // Score-only mode agrees with the full alignment.
        assert_eq!(score_of(&mut engine, &pa, &pb), *alignment.score());
    }
}

#[test]
fn profile_alignment_matches_reference() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    let scheme = symbols::GapAware::new(symbols::Matrix::nucleotide(10.0, -9.0));

    for trial in 0..40 {
        let total = 4;
        let build = |engine: &mut TestEngine, rng: &mut StdRng, base: usize| {
            let len = rng.random_range(5..=25);
            let first = random_sequence(rng, len);
            let mut profile = Profile::single(base, &first, total).unwrap();
            if rng.random_bool(0.7) {
                let len = rng.random_range(5..=25);
                let second = random_sequence(rng, len);
                let other = Profile::single(base + 1, &second, total).unwrap();
                let alignment = run(engine, &profile, &other).unwrap();
                profile =
                    Profile::combine(&profile, &other, alignment.first(), alignment.second())
                        .unwrap();
            }
            profile
        };
        engine.with_free_ends(FreeEndGaps::default());
        let pa = build(&mut engine, &mut rng, 0);
        let pb = build(&mut engine, &mut rng, 2);

        let alignment = run(&mut engine, &pa, &pb).unwrap();
        let oracle = reference::align(&pa, &pb, &scheme, 8.0, 4.0, (false, false));

        // Equal-scoring paths may be tied differently between the two
        // traversals, so profiles are held to score equality plus a valid,
        // score-consistent path.
        assert_eq!(*alignment.score(), oracle.score, "trial {}", trial);
        let rescored = reference::rescore(
            &pa,
            &pb,
            &scheme,
            8.0,
            4.0,
            (false, false),
            alignment.first(),
            alignment.second(),
        );
        assert_eq!(rescored, *alignment.score(), "trial {}", trial);

        // The combined profile keeps every invariant.
        let combined =
            Profile::combine(&pa, &pb, alignment.first(), alignment.second()).unwrap();
        assert_eq!(combined.size(), pa.size() + pb.size());
        for (_, padded) in combined.members() {
            assert_eq!(padded.len(), combined.len());
        }
        for column in combined.columns() {
            assert_eq!(column.total() as usize, combined.size());
        }
    }
}

#[test]
fn existing_gaps_attract_new_gaps() {
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    let a = Profile::single(0, b"ACGT", 3).unwrap();
    let b = Profile::single(1, b"ACAGT", 3).unwrap();
    let alignment = run(&mut engine, &a, &b).unwrap();
    let combined = Profile::combine(&a, &b, alignment.first(), alignment.second()).unwrap();
    assert_eq!(combined.member(0), Some(b"AC-GT".as_slice()));
    assert_eq!(combined.member(1), Some(b"ACAGT".as_slice()));

    let fresh = Profile::single(2, b"AGGT", 3).unwrap();
    let alignment = run(&mut engine, &combined, &fresh).unwrap();
    assert_eq!(*alignment.score(), 17.5);
    assert_eq!(
        alignment.first().iter().collect::<Vec<_>>(),
        vec![true; 5]
    );
    let final_profile =
        Profile::combine(&combined, &fresh, alignment.first(), alignment.second()).unwrap();
    assert_eq!(final_profile.member(2), Some(b"A-GGT".as_slice()));
}

#[test]
fn cancelled_runs_produce_no_result() {
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    let a = Profile::single(0, &b"ACGT".repeat(10), 2).unwrap();
    let b = Profile::single(1, &b"AGGT".repeat(10), 2).unwrap();

    // Pre-cancelled token: nothing runs.
    let mut sink = Silent;
    let token = CancellationToken::new();
    token.cancel();
    let mut monitor = Monitor::new(&mut sink, token, 1.0);
    assert!(engine.align(&a, &b, &mut monitor).unwrap().is_none());

    // A sink that refuses to continue stops the run at a row boundary.
    struct Refuse {
        after: usize,
        reports: usize,
    }
    impl Progress for Refuse {
        fn fraction(&mut self, _: f64) -> bool {
            self.reports += 1;
            self.reports < self.after
        }
    }
    let mut sink = Refuse {
        after: 3,
        reports: 0,
    };
    let mut monitor = Monitor::new(&mut sink, CancellationToken::new(), 1.0);
    assert!(engine.align(&a, &b, &mut monitor).unwrap().is_none());
    assert!(monitor.is_cancelled());

    // The engine's buffers recover on the next call.
    let alignment = run(&mut engine, &a, &b).unwrap();
    assert_eq!(alignment.first().consumed(), a.len());
}

#[test]
fn empty_profiles_are_rejected() {
    let mut engine = engine(10.0, -9.0, 8.0, 4.0);
    let a = Profile::single(0, b"ACGT", 2).unwrap();
    let mut sink = Silent;
    let mut monitor = Monitor::new(&mut sink, CancellationToken::new(), 1.0);
    assert!(engine
        .align(&a, &Profile::default(), &mut monitor)
        .is_err());
    assert!(engine.align_sequences(b"ACGT", b"---", &mut monitor).is_err());
}
