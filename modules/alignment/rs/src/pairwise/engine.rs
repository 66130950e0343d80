use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use eyre::{ensure, eyre, Result};

use phyloalign_core_rs::progress::Monitor;

use crate::mask::ColumnMask;
use crate::profile::Profile;
use crate::scoring::Scheme;
use crate::Score;

use super::context::{
    Context, Mid, State, BASE_CASE_LIMIT, DIAGONAL_ORDER, GAP_FIRST_ORDER,
};

/// Whether leading and trailing gaps appearing in each profile's output are
/// penalty-free (semi-global alignment).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Constructor)]
pub struct FreeEndGaps {
    pub first: bool,
    pub second: bool,
}

/// A finished pairwise alignment: the score plus one column mask per side.
#[derive(Clone, Debug, PartialEq, Getters, Dissolve)]
pub struct PairAlignment<S: Score> {
    score: S,
    first: ColumnMask,
    second: ColumnMask,
}

impl<S: Score> PairAlignment<S> {
    /// Total number of output columns.
    pub fn columns(&self) -> usize {
        self.first.len()
    }
}

/// Linear-space affine-gap alignment of two profiles.
///
/// The engine keeps the three-state affine recurrence in two rolling rows
/// and finds the optimal path by divide and conquer on the midpoint row,
/// falling back to a quadratic traceback once a block drops under
/// [`BASE_CASE_LIMIT`] in either dimension. Scratch buffers are owned by the
/// engine and grow to the largest request seen, so an engine must not be
/// shared between concurrent alignments; independent engines are
/// independent.
pub struct Engine<S: Score, Sch: Scheme<Score = S>> {
    scheme: Sch,
    free: FreeEndGaps,
    ctx: Context<S>,
}

impl<S: Score, Sch: Scheme<Score = S>> Engine<S, Sch> {
    pub fn new(scheme: Sch) -> Self {
        Self {
            scheme,
            free: FreeEndGaps::default(),
            ctx: Context::default(),
        }
    }

    pub fn with_free_ends(&mut self, free: FreeEndGaps) {
        self.free = free;
    }

    pub fn free_ends(&self) -> FreeEndGaps {
        self.free
    }

    pub fn scheme(&self) -> &Sch {
        &self.scheme
    }

    pub fn with_scheme(&mut self, scheme: Sch) {
        self.scheme = scheme;
    }

    /// Align two profiles. Returns `None` if the run was cancelled; partial
    /// output is discarded.
    pub fn align(
        &mut self,
        a: &Profile,
        b: &Profile,
        monitor: &mut Monitor<'_>,
    ) -> Result<Option<PairAlignment<S>>> {
        ensure!(!a.is_empty() && !b.is_empty(), "cannot align an empty profile");
        log::debug!("aligning {} x {} profile columns", a.len(), b.len());
        self.ctx.prepare(a, b);
        let (rows, cols) = (a.len(), b.len());
        let score = {
            let mut solver = Solver {
                scheme: &self.scheme,
                a,
                b,
                free: self.free,
                open: self.scheme.open(),
                extend: self.scheme.extend(),
                rows,
                cols,
                ctx: &mut self.ctx,
                monitor,
                // The divide and conquer revisits about half of the matrix
                // across all recursion levels.
                cells_total: 2.0 * (rows * cols) as f64,
                cells_done: 0.0,
            };
            match solver.solve(0, rows, 0, cols, State::Diagonal, None)? {
                None => return Ok(None),
                Some(score) => score,
            }
        };
        monitor.report(1.0);

        let first = std::mem::take(&mut self.ctx.first);
        let second = std::mem::take(&mut self.ctx.second);
        debug_assert_eq!(first.len(), second.len());
        debug_assert_eq!(first.consumed(), rows);
        debug_assert_eq!(second.consumed(), cols);
        Ok(Some(PairAlignment {
            score,
            first,
            second,
        }))
    }

    /// Alignment score of two profiles without building the column masks.
    pub fn score_only(
        &mut self,
        a: &Profile,
        b: &Profile,
        monitor: &mut Monitor<'_>,
    ) -> Result<Option<S>> {
        ensure!(!a.is_empty() && !b.is_empty(), "cannot align an empty profile");
        self.ctx.prepare(a, b);
        let (rows, cols) = (a.len(), b.len());
        let mut solver = Solver {
            scheme: &self.scheme,
            a,
            b,
            free: self.free,
            open: self.scheme.open(),
            extend: self.scheme.extend(),
            rows,
            cols,
            ctx: &mut self.ctx,
            monitor,
            cells_total: (rows * cols) as f64,
            cells_done: 0.0,
        };
        if solver.sweep(0, rows, 0, cols, State::Diagonal)?.is_none() {
            return Ok(None);
        }
        let cur = &solver.ctx.cur;
        let (score, _) = pick([
            cur.score[State::Diagonal as usize][cols],
            cur.score[State::GapSecond as usize][cols],
            cur.score[State::GapFirst as usize][cols],
        ]);
        if score == S::neg_infinity() {
            return Err(eyre!("no terminal state is reachable for {} x {} columns", rows, cols));
        }
        Ok(Some(score))
    }

    /// Convenience: align two raw sequences as single-member profiles.
    pub fn align_sequences(
        &mut self,
        a: &[u8],
        b: &[u8],
        monitor: &mut Monitor<'_>,
    ) -> Result<Option<PairAlignment<S>>> {
        let a = Profile::single(0, a, 2)?;
        let b = Profile::single(1, b, 2)?;
        self.align(&a, &b, monitor)
    }
}

/// First strictly greater candidate wins; the caller maps the returned index
/// onto states through the matching order table.
#[inline(always)]
fn pick<S: Score>(candidates: [S; 3]) -> (S, usize) {
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

/// One alignment call: the recursion state threaded through the divide and
/// conquer, borrowing the engine's scratch context.
struct Solver<'e, 'p, S: Score, Sch: Scheme<Score = S>> {
    scheme: &'e Sch,
    a: &'e Profile,
    b: &'e Profile,
    free: FreeEndGaps,
    open: S,
    extend: S,
    rows: usize,
    cols: usize,
    ctx: &'e mut Context<S>,
    monitor: &'e mut Monitor<'p>,
    cells_total: f64,
    cells_done: f64,
}

impl<'e, 'p, S: Score, Sch: Scheme<Score = S>> Solver<'e, 'p, S, Sch> {
    #[inline(always)]
    fn substitution(&self, gi: usize, gj: usize) -> S {
        self.a.columns()[gi].expected_score(&self.b.columns()[gj], self.scheme)
    }

    /// Open/extend cost of a gap in the second profile's output while the
    /// first profile consumes column `gi`; `gj` is how many columns of the
    /// second profile have been consumed at that point. Costs shrink with
    /// the consumed column's gap fraction and vanish at free ends.
    #[inline(always)]
    fn gap_second_cost(&self, gi: usize, gj: usize) -> (S, S) {
        if self.free.second && (gj == 0 || gj == self.cols) {
            return (S::zero(), S::zero());
        }
        let gf = self.ctx.gap_first[gi];
        (
            self.open - self.extend * gf,
            self.extend * (S::one() - gf),
        )
    }

    /// Mirror image of [`Self::gap_second_cost`]: a gap in the first
    /// profile's output while the second consumes column `gj`.
    #[inline(always)]
    fn gap_first_cost(&self, gi: usize, gj: usize) -> (S, S) {
        if self.free.first && (gi == 0 || gi == self.rows) {
            return (S::zero(), S::zero());
        }
        let gf = self.ctx.gap_second[gj];
        (
            self.open - self.extend * gf,
            self.extend * (S::one() - gf),
        )
    }

    /// Report row-level progress; `false` requests a cooperative abort.
    fn tick(&mut self) -> bool {
        let fraction = (self.cells_done / self.cells_total).min(1.0);
        self.monitor.report(fraction)
    }

    /// Solve one block of the alignment, appending its columns to the output
    /// masks. `start` is the state the path enters the block with; `end`
    /// pins the state it must leave in (used by the split). Returns the
    /// block score, or `None` once cancellation is observed.
    fn solve(
        &mut self,
        r0: usize,
        r1: usize,
        c0: usize,
        c1: usize,
        start: State,
        end: Option<State>,
    ) -> Result<Option<S>> {
        if self.monitor.is_cancelled() {
            return Ok(None);
        }
        let (n, m) = (r1 - r0, c1 - c0);
        if n < BASE_CASE_LIMIT || m < BASE_CASE_LIMIT {
            return self.base_case(r0, r1, c0, c1, start, end);
        }
        if self.sweep(r0, r1, c0, c1, start)?.is_none() {
            return Ok(None);
        }

        let terminal = match end {
            Some(state) => state,
            None => {
                let cur = &self.ctx.cur;
                let (_, which) = pick([
                    cur.score[State::Diagonal as usize][m],
                    cur.score[State::GapSecond as usize][m],
                    cur.score[State::GapFirst as usize][m],
                ]);
                DIAGONAL_ORDER[which]
            }
        };
        let score = self.ctx.cur.score[terminal as usize][m];
        if score == S::neg_infinity() {
            return Err(eyre!(
                "terminal state {:?} is unreachable in the {}..{} x {}..{} block",
                terminal,
                r0,
                r1,
                c0,
                c1
            ));
        }
        let Mid { col, state } = self.ctx.cur.mid[terminal as usize][m];

        let split = r0 + n / 2;
        if self.solve(r0, split, c0, c0 + col, start, Some(state))?.is_none() {
            return Ok(None);
        }
        if self.solve(split, r1, c0 + col, c1, state, end)?.is_none() {
            return Ok(None);
        }
        Ok(Some(score))
    }

    /// Forward sweep over a block keeping two rows per state, recording for
    /// every cell where its optimal path crossed the split row. The final
    /// row is left in `ctx.cur`.
    fn sweep(
        &mut self,
        r0: usize,
        r1: usize,
        c0: usize,
        c1: usize,
        start: State,
    ) -> Result<Option<()>> {
        const D: usize = State::Diagonal as usize;
        const GS: usize = State::GapSecond as usize;
        const GF: usize = State::GapFirst as usize;

        let (n, m) = (r1 - r0, c1 - c0);
        let split = n / 2;
        self.ctx.reset_rows(m + 1);

        self.ctx.cur.score[start as usize][0] = S::zero();
        for j in 1..=m {
            let (gap_open, gap_extend) = self.gap_first_cost(r0, c0 + j - 1);
            let cur = &mut self.ctx.cur;
            let (value, which) = pick([
                cur.score[D][j - 1] - gap_open,
                cur.score[GF][j - 1] - gap_extend,
                cur.score[GS][j - 1] - gap_open,
            ]);
            cur.score[GF][j] = value;
            cur.mid[GF][j] = cur.mid[GAP_FIRST_ORDER[which] as usize][j - 1];
        }
        if split == 0 {
            Self::stamp(&mut self.ctx.cur, m);
        }

        for i in 1..=n {
            std::mem::swap(&mut self.ctx.prev, &mut self.ctx.cur);

            let (gap_open, gap_extend) = self.gap_second_cost(r0 + i - 1, c0);
            {
                let ctx = &mut *self.ctx;
                let (prev, cur) = (&ctx.prev, &mut ctx.cur);
                let (value, which) = pick([
                    prev.score[D][0] - gap_open,
                    prev.score[GS][0] - gap_extend,
                    prev.score[GF][0] - gap_open,
                ]);
                cur.score[GS][0] = value;
                cur.mid[GS][0] = prev.mid[DIAGONAL_ORDER[which] as usize][0];
                cur.score[D][0] = S::neg_infinity();
                cur.score[GF][0] = S::neg_infinity();
            }

            for j in 1..=m {
                let substitution = self.substitution(r0 + i - 1, c0 + j - 1);
                let (second_open, second_extend) = self.gap_second_cost(r0 + i - 1, c0 + j);
                let (first_open, first_extend) = self.gap_first_cost(r0 + i, c0 + j - 1);

                let ctx = &mut *self.ctx;
                let (prev, cur) = (&ctx.prev, &mut ctx.cur);

                let (value, which) = pick([
                    prev.score[D][j - 1],
                    prev.score[GS][j - 1],
                    prev.score[GF][j - 1],
                ]);
                cur.score[D][j] = value + substitution;
                cur.mid[D][j] = prev.mid[DIAGONAL_ORDER[which] as usize][j - 1];

                let (value, which) = pick([
                    prev.score[D][j] - second_open,
                    prev.score[GS][j] - second_extend,
                    prev.score[GF][j] - second_open,
                ]);
                cur.score[GS][j] = value;
                cur.mid[GS][j] = prev.mid[DIAGONAL_ORDER[which] as usize][j];

                let (value, which) = pick([
                    cur.score[D][j - 1] - first_open,
                    cur.score[GF][j - 1] - first_extend,
                    cur.score[GS][j - 1] - first_open,
                ]);
                cur.score[GF][j] = value;
                cur.mid[GF][j] = cur.mid[GAP_FIRST_ORDER[which] as usize][j - 1];
            }

            if i == split {
                Self::stamp(&mut self.ctx.cur, m);
            }

            self.cells_done += m as f64;
            if !self.tick() {
                return Ok(None);
            }
        }
        Ok(Some(()))
    }

    /// Record every cell of the split row as its own crossing point.
    fn stamp(rows: &mut super::context::Rows<S>, m: usize) {
        for state in [State::Diagonal, State::GapSecond, State::GapFirst] {
            for (col, mid) in rows.mid[state as usize][..=m].iter_mut().enumerate() {
                *mid = Mid { col, state };
            }
        }
    }

    /// Quadratic DP with explicit back pointers for blocks too thin to
    /// split, followed by the traceback that emits the output columns.
    fn base_case(
        &mut self,
        r0: usize,
        r1: usize,
        c0: usize,
        c1: usize,
        start: State,
        end: Option<State>,
    ) -> Result<Option<S>> {
        const D: usize = State::Diagonal as usize;
        const GS: usize = State::GapSecond as usize;
        const GF: usize = State::GapFirst as usize;

        let (n, m) = (r1 - r0, c1 - c0);
        let width = m + 1;
        self.ctx.reset_base(n, m);
        self.ctx.scores[start as usize][0] = S::zero();

        for j in 1..=m {
            let (gap_open, gap_extend) = self.gap_first_cost(r0, c0 + j - 1);
            let ctx = &mut *self.ctx;
            let (value, which) = pick([
                ctx.scores[D][j - 1] - gap_open,
                ctx.scores[GF][j - 1] - gap_extend,
                ctx.scores[GS][j - 1] - gap_open,
            ]);
            ctx.scores[GF][j] = value;
            ctx.back[GF][j] = GAP_FIRST_ORDER[which];
        }

        for i in 1..=n {
            let at = i * width;
            let up = at - width;

            let (gap_open, gap_extend) = self.gap_second_cost(r0 + i - 1, c0);
            {
                let ctx = &mut *self.ctx;
                let (value, which) = pick([
                    ctx.scores[D][up] - gap_open,
                    ctx.scores[GS][up] - gap_extend,
                    ctx.scores[GF][up] - gap_open,
                ]);
                ctx.scores[GS][at] = value;
                ctx.back[GS][at] = DIAGONAL_ORDER[which];
            }

            for j in 1..=m {
                let substitution = self.substitution(r0 + i - 1, c0 + j - 1);
                let (second_open, second_extend) = self.gap_second_cost(r0 + i - 1, c0 + j);
                let (first_open, first_extend) = self.gap_first_cost(r0 + i, c0 + j - 1);

                let ctx = &mut *self.ctx;
                let (value, which) = pick([
                    ctx.scores[D][up + j - 1],
                    ctx.scores[GS][up + j - 1],
                    ctx.scores[GF][up + j - 1],
                ]);
                ctx.scores[D][at + j] = value + substitution;
                ctx.back[D][at + j] = DIAGONAL_ORDER[which];

                let (value, which) = pick([
                    ctx.scores[D][up + j] - second_open,
                    ctx.scores[GS][up + j] - second_extend,
                    ctx.scores[GF][up + j] - second_open,
                ]);
                ctx.scores[GS][at + j] = value;
                ctx.back[GS][at + j] = DIAGONAL_ORDER[which];

                let (value, which) = pick([
                    ctx.scores[D][at + j - 1] - first_open,
                    ctx.scores[GF][at + j - 1] - first_extend,
                    ctx.scores[GS][at + j - 1] - first_open,
                ]);
                ctx.scores[GF][at + j] = value;
                ctx.back[GF][at + j] = GAP_FIRST_ORDER[which];
            }

            self.cells_done += m as f64;
            if !self.tick() {
                return Ok(None);
            }
        }

        let last = n * width + m;
        let terminal = match end {
            Some(state) => state,
            None => {
                let (_, which) = pick([
                    self.ctx.scores[D][last],
                    self.ctx.scores[GS][last],
                    self.ctx.scores[GF][last],
                ]);
                DIAGONAL_ORDER[which]
            }
        };
        let score = self.ctx.scores[terminal as usize][last];
        if score == S::neg_infinity() {
            return Err(eyre!(
                "terminal state {:?} is unreachable in the {}..{} x {}..{} block",
                terminal,
                r0,
                r1,
                c0,
                c1
            ));
        }

        // Walk the back pointers to the block origin, then emit the columns
        // in forward order.
        self.ctx.steps.clear();
        let (mut i, mut j) = (n, m);
        let mut state = terminal;
        while i > 0 || j > 0 {
            self.ctx.steps.push(state);
            let predecessor = self.ctx.back[state as usize][i * width + j];
            match state {
                State::Diagonal if i > 0 && j > 0 => {
                    i -= 1;
                    j -= 1;
                }
                State::GapSecond if i > 0 => i -= 1,
                State::GapFirst if j > 0 => j -= 1,
                _ => {
                    return Err(eyre!(
                        "malformed traceback: state {:?} at offset ({}, {}) of a {} x {} block",
                        state,
                        i,
                        j,
                        n,
                        m
                    ))
                }
            }
            state = predecessor;
        }
        if state != start {
            return Err(eyre!(
                "traceback reached the block origin in state {:?}, expected {:?}",
                state,
                start
            ));
        }
        for &step in self.ctx.steps.iter().rev() {
            self.ctx.first.push(step != State::GapFirst);
            self.ctx.second.push(step != State::GapSecond);
        }
        Ok(Some(score))
    }
}
