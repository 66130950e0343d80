pub use engine::{Engine, FreeEndGaps, PairAlignment};

mod context;
mod engine;
