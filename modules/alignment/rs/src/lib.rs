pub use phyloalign_core_rs::seq::GAP;

pub use mask::ColumnMask;
pub use pairwise::{Engine, FreeEndGaps, PairAlignment};
pub use profile::{Profile, ProfileColumn};

pub mod mask;
pub mod pairwise;
pub mod profile;
pub mod scoring;

/// Alignment scores are floating point: profile columns score as
/// count-weighted averages, so integer arithmetic does not survive
/// sequence-vs-profile alignment.
pub trait Score: phyloalign_core_rs::num::Float {}

impl<T: phyloalign_core_rs::num::Float> Score for T {}
