use eyre::{ensure, eyre, Result};

use phyloalign_alignment_rs::pairwise::Engine;
use phyloalign_alignment_rs::profile::Profile;
use phyloalign_alignment_rs::scoring::Scheme;
use phyloalign_alignment_rs::Score;
use phyloalign_core_rs::progress::{CancellationToken, Monitor, Progress};
use phyloalign_core_rs::seq::Sequence;

use crate::tree::GuideTree;

/// Progressive multiple alignment driver.
///
/// An initial alignment is assembled by walking the guide tree and merging
/// child profiles pairwise; it is then refined in the manner of Barton and
/// Sternberg (1987): every sequence in turn is removed from the profile,
/// re-aligned against the remainder and merged back. The refinement budget
/// is a fixed pass count, not a convergence criterion.
pub struct Aligner<S: Score, Sch: Scheme<Score = S>> {
    engine: Engine<S, Sch>,
    refinement_passes: usize,
}

impl<S: Score, Sch: Scheme<Score = S>> Aligner<S, Sch> {
    pub fn new(engine: Engine<S, Sch>, refinement_passes: usize) -> Self {
        Self {
            engine,
            refinement_passes,
        }
    }

    pub fn engine(&mut self) -> &mut Engine<S, Sch> {
        &mut self.engine
    }

    /// Align `sequences` along `tree`. Returns one padded string per input
    /// index, or `None` if the run was cancelled at any level.
    pub fn align(
        &mut self,
        sequences: &[Sequence],
        tree: &GuideTree,
        sink: &mut dyn Progress,
        token: CancellationToken,
    ) -> Result<Option<Vec<Vec<u8>>>> {
        ensure!(!sequences.is_empty(), "nothing to align");
        tree.validate(sequences.len())?;

        let count = sequences.len();
        let merges = (count - 1) as f64;
        let refinements = (self.refinement_passes * count) as f64;
        let mut monitor = Monitor::new(sink, token, merges + refinements);

        let profile = match self.merge(sequences, tree, &mut monitor)? {
            None => return Ok(None),
            Some(profile) => profile,
        };
        let profile = match self.refine(sequences, profile, &mut monitor)? {
            None => return Ok(None),
            Some(profile) => profile,
        };

        let mut padded = Vec::with_capacity(count);
        for index in 0..count {
            let member = profile
                .member(index)
                .ok_or_else(|| eyre!("sequence {} is missing from the final profile", index))?;
            padded.push(member.to_vec());
        }
        Ok(Some(padded))
    }

    /// Walk the guide tree bottom-up, merging child profiles.
    fn merge(
        &mut self,
        sequences: &[Sequence],
        tree: &GuideTree,
        monitor: &mut Monitor<'_>,
    ) -> Result<Option<Profile>> {
        if monitor.is_cancelled() {
            return Ok(None);
        }
        match tree {
            GuideTree::Leaf(index) => {
                let residues = sequences[*index].checked_ungapped()?;
                Profile::single(*index, &residues, sequences.len()).map(Some)
            }
            GuideTree::Node(left, right) => {
                let left = match self.merge(sequences, left, monitor)? {
                    None => return Ok(None),
                    Some(profile) => profile,
                };
                let right = match self.merge(sequences, right, monitor)? {
                    None => return Ok(None),
                    Some(profile) => profile,
                };
                monitor.begin_section(1.0);
                let alignment = self.engine.align(&left, &right, monitor)?;
                monitor.end_section();
                match alignment {
                    None => Ok(None),
                    Some(alignment) => {
                        Profile::combine(&left, &right, alignment.first(), alignment.second())
                            .map(Some)
                    }
                }
            }
        }
    }

    /// Remove, re-align and merge back every sequence, `refinement_passes`
    /// times over. A pass may leave the alignment unchanged; the budget is
    /// spent regardless.
    fn refine(
        &mut self,
        sequences: &[Sequence],
        mut profile: Profile,
        monitor: &mut Monitor<'_>,
    ) -> Result<Option<Profile>> {
        let count = sequences.len();
        if count < 2 {
            return Ok(Some(profile));
        }
        for pass in 0..self.refinement_passes {
            for index in 0..count {
                if monitor.is_cancelled() {
                    return Ok(None);
                }
                profile.remove(index)?;
                let residues = sequences[index].checked_ungapped()?;
                let single = Profile::single(index, &residues, count)?;
                monitor.begin_section(1.0);
                let alignment = self.engine.align(&profile, &single, monitor)?;
                monitor.end_section();
                profile = match alignment {
                    None => return Ok(None),
                    Some(alignment) => {
                        Profile::combine(&profile, &single, alignment.first(), alignment.second())?
                    }
                };
            }
            log::debug!(
                "refinement pass {}/{} done, {} columns",
                pass + 1,
                self.refinement_passes,
                profile.len()
            );
        }
        Ok(Some(profile))
    }
}
